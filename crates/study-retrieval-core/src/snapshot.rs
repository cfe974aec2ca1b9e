//! The immutable (index, metadata) pair served by search.

use crate::index::FlatL2Index;
use crate::models::Chunk;

/// A vector index together with the chunk table it was built from.
///
/// `metadata[i]` describes the vector at row `i`, and every row was
/// embedded by `model`. A snapshot is never mutated after construction;
/// reloading replaces the whole snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub model: String,
    pub index: FlatL2Index,
    pub metadata: Vec<Chunk>,
}

impl Snapshot {
    pub fn new(model: impl Into<String>, index: FlatL2Index, metadata: Vec<Chunk>) -> Self {
        Self {
            model: model.into(),
            index,
            metadata,
        }
    }

    /// Whether this snapshot can serve traffic: the metadata table must be
    /// non-empty.
    pub fn is_ready(&self) -> bool {
        !self.metadata.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.metadata.len()
    }

    pub fn dims(&self) -> usize {
        self.index.dims()
    }
}
