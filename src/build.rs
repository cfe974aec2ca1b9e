//! Index builder.
//!
//! Reads the whole corpus, embeds every chunk in batches, and writes the
//! (index, metadata) artifact pair. Rows are appended in corpus order, so
//! row `i` of the index is always chunk `i` of the metadata.
//!
//! An empty corpus aborts the build before anything is written; a
//! previously good index stays in place.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use study_retrieval_core::embedding::EmbeddingProvider;
use study_retrieval_core::index::FlatL2Index;

use crate::artifacts::{write_artifacts, ArtifactPaths};
use crate::config::Config;
use crate::corpus::read_corpus;
use crate::embedding;

/// Outcome of one [`build_index`] run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub chunks: usize,
    pub lessons_scanned: usize,
    pub books_scanned: usize,
    pub skipped_documents: usize,
    pub dims: usize,
    /// False only when the corpus was empty and no artifact was touched.
    pub written: bool,
    pub finished_at: DateTime<Utc>,
}

/// CLI `build`: rebuild the artifacts and print the report.
pub async fn run_build(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let provider = embedding::create_provider(&config.embedding)?;
    let report = build_index(config, provider.as_ref()).await?;

    println!("build");
    println!("  lessons scanned: {}", report.lessons_scanned);
    println!("  books scanned: {}", report.books_scanned);
    println!("  skipped documents: {}", report.skipped_documents);
    println!("  chunks: {}", report.chunks);
    if report.written {
        println!("  dims: {}", report.dims);
        println!("  index: {}", config.index.index_path.display());
        println!("  metadata: {}", config.index.metadata_path.display());
    } else {
        println!("  no chunks found; existing index left unchanged");
    }
    Ok(())
}

/// Rebuild the artifacts from the configured corpus.
///
/// The corpus walk and the artifact writes run on the blocking pool, so a
/// long build never occupies an async worker.
pub async fn build_index(config: &Config, provider: &dyn EmbeddingProvider) -> Result<BuildReport> {
    let corpus = config.corpus.clone();
    let scan = tokio::task::spawn_blocking(move || read_corpus(&corpus))
        .await
        .context("corpus scan task failed")??;
    let dims = provider.dims();

    let mut report = BuildReport {
        chunks: scan.chunks.len(),
        lessons_scanned: scan.lessons_scanned,
        books_scanned: scan.books_scanned,
        skipped_documents: scan.skipped_documents,
        dims,
        written: false,
        finished_at: Utc::now(),
    };

    if scan.chunks.is_empty() {
        warn!(
            lessons = scan.lessons_scanned,
            books = scan.books_scanned,
            "no chunks found, keeping existing index"
        );
        return Ok(report);
    }

    if dims == 0 {
        bail!(
            "Embedding provider '{}' reports 0 dimensions; set [embedding] provider in config.",
            provider.model_name()
        );
    }

    info!(
        chunks = scan.chunks.len(),
        model = provider.model_name(),
        dims,
        "embedding corpus"
    );

    let batch_size = config.embedding.batch_size.max(1);
    let mut index = FlatL2Index::new(dims);

    for (batch_no, batch) in scan.chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider
            .embed(&texts)
            .await
            .with_context(|| format!("embedding batch {} failed", batch_no + 1))?;

        if vectors.len() != texts.len() {
            bail!(
                "embedding batch {} returned {} vectors for {} texts",
                batch_no + 1,
                vectors.len(),
                texts.len()
            );
        }
        for vector in &vectors {
            index
                .add(vector)
                .with_context(|| format!("embedding batch {}", batch_no + 1))?;
        }
    }

    let paths = ArtifactPaths::from_config(&config.index);
    let rows = index.len();
    let model = provider.model_name().to_string();
    let target = paths.clone();
    tokio::task::spawn_blocking(move || write_artifacts(&target, &model, &index, &scan.chunks))
        .await
        .context("artifact write task failed")??;

    report.written = true;
    report.finished_at = Utc::now();
    info!(
        rows,
        index = %paths.index.display(),
        metadata = %paths.metadata.display(),
        "index written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::read_snapshot;
    use crate::config::parse_config;
    use crate::embedding::HashingProvider;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> Config {
        let toml = format!(
            r#"
[corpus]
lessons_dir = "{root}/lessons"
books_dir = "{root}/books"

[index]
index_path = "{root}/out/index.bin"
metadata_path = "{root}/out/meta.json"

[embedding]
provider = "hashing"
dims = 32
batch_size = 2
"#,
            root = root.display()
        );
        parse_config(&toml).unwrap()
    }

    fn write(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_build_writes_aligned_artifacts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            &root.join("lessons/1/lesson.json"),
            r#"{"lesson":{"daily_sections":[
                {"content":["one"]},{"content":["two"]},{"content":["three"]}
            ]}}"#,
        );
        let config = config_for(root);
        let provider = HashingProvider::new(32);

        let report = build_index(&config, &provider).await.unwrap();
        assert!(report.written);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.dims, 32);

        let snapshot = read_snapshot(&ArtifactPaths::from_config(&config.index)).unwrap();
        assert_eq!(snapshot.chunk_count(), 3);
        assert_eq!(snapshot.model, "hashing");
        for (row, chunk) in snapshot.metadata.iter().enumerate() {
            assert_eq!(
                snapshot.index.row(row).unwrap(),
                provider.embed_text(&chunk.text).as_slice()
            );
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_keeps_existing_artifacts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let config = config_for(root);
        write(&config.index.index_path, "previous index");
        write(&config.index.metadata_path, "previous metadata");

        let report = build_index(&config, &HashingProvider::new(32))
            .await
            .unwrap();
        assert!(!report.written);
        assert_eq!(report.chunks, 0);
        assert_eq!(
            std::fs::read_to_string(&config.index.index_path).unwrap(),
            "previous index"
        );
        assert_eq!(
            std::fs::read_to_string(&config.index.metadata_path).unwrap(),
            "previous metadata"
        );
    }

    #[tokio::test]
    async fn test_provider_dimension_mismatch_aborts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(&root.join("books/b.json"), r#"{"content":"text"}"#);
        let config = config_for(root);

        struct Liar;
        #[async_trait::async_trait]
        impl EmbeddingProvider for Liar {
            fn model_name(&self) -> &str {
                "liar"
            }
            fn dims(&self) -> usize {
                4
            }
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
            }
        }

        assert!(build_index(&config, &Liar).await.is_err());
        assert!(!config.index.index_path.exists());
    }
}
