//! Re-reads hit text from the corpus on disk.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use study_retrieval_core::corpus::reconstruct;
use study_retrieval_core::models::Chunk;
use study_retrieval_core::search::TextSource;

use crate::corpus::read_document;

/// [`TextSource`] that opens `chunk.source` and re-derives the passage.
pub struct SourceReader;

impl TextSource for SourceReader {
    fn reconstruct(&self, chunk: &Chunk) -> Result<String> {
        let path = Path::new(&chunk.source);
        let doc = read_document(path).with_context(|| format!("reading {}", path.display()))?;
        reconstruct(&doc, chunk).ok_or_else(|| {
            anyhow!(
                "{} chunk no longer resolves in {}",
                chunk.type_tag(),
                path.display()
            )
        })
    }
}
