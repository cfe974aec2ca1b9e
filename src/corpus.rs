//! Corpus reader.
//!
//! Walks the two configured collections and turns every readable JSON
//! document into chunks:
//!
//! - **Lessons**: every file under `corpus.lessons_dir` whose name equals
//!   `corpus.lesson_file_name` (default `lesson.json`), at any depth.
//! - **Books**: every file under `corpus.books_dir` whose path relative to
//!   that root matches one of `corpus.book_globs`.
//!
//! Documents are visited in sorted path order so repeated builds over an
//! unchanged tree produce identical row order. A document that cannot be
//! read or parsed is logged and skipped; it never fails the scan.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use study_retrieval_core::corpus::{book_chunks, lesson_chunks};
use study_retrieval_core::models::Chunk;

use crate::config::CorpusConfig;

/// Chunks in corpus order plus per-collection scan counts.
#[derive(Debug, Default)]
pub struct CorpusScan {
    pub chunks: Vec<Chunk>,
    pub lessons_scanned: usize,
    pub books_scanned: usize,
    pub skipped_documents: usize,
}

/// Read every lesson then every book under the configured roots.
///
/// A missing collection root is not an error: it contributes nothing and
/// is logged at `warn`.
pub fn read_corpus(config: &CorpusConfig) -> Result<CorpusScan> {
    let mut scan = CorpusScan::default();

    for path in lesson_files(config)? {
        scan.lessons_scanned += 1;
        match read_document(&path).and_then(|doc| lesson_chunks(&doc, &locator(&path))) {
            Ok(chunks) => {
                debug!(path = %path.display(), chunks = chunks.len(), "lesson read");
                scan.chunks.extend(chunks);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "skipping lesson");
                scan.skipped_documents += 1;
            }
        }
    }

    for path in book_files(config)? {
        scan.books_scanned += 1;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match read_document(&path).and_then(|doc| book_chunks(&doc, &locator(&path), &stem)) {
            Ok(chunks) => {
                debug!(path = %path.display(), chunks = chunks.len(), "book read");
                scan.chunks.extend(chunks);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "skipping book");
                scan.skipped_documents += 1;
            }
        }
    }

    Ok(scan)
}

/// Parse a corpus document from disk.
pub fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn locator(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn lesson_files(config: &CorpusConfig) -> Result<Vec<PathBuf>> {
    let root = &config.lessons_dir;
    if !root.exists() {
        warn!(root = %root.display(), "lessons directory does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable entry under lessons directory");
                continue;
            }
        };
        if entry.file_type().is_file() && entry.file_name() == config.lesson_file_name.as_str() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn book_files(config: &CorpusConfig) -> Result<Vec<PathBuf>> {
    let root = &config.books_dir;
    if !root.exists() {
        warn!(root = %root.display(), "books directory does not exist");
        return Ok(Vec::new());
    }

    let include_set = build_globset(&config.book_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable entry under books directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    if patterns.is_empty() {
        bail!("corpus.book_globs must contain at least one pattern");
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
