//! Error types for the vector index and search algorithm.

/// Errors raised by [`FlatL2Index`](crate::index::FlatL2Index) operations
/// and its artifact codec.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("not a vector index artifact (bad magic)")]
    BadMagic,

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("index artifact truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("index artifact model name is not valid UTF-8")]
    BadModelName,

    #[error("index dimensions or model name too large for the artifact header")]
    HeaderOverflow,
}

/// Why a search produced no result list.
///
/// The HTTP layer flattens any of these into a single `{"error": ...}`
/// element so clients see the same response shape as a successful search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Query is empty or invalid.")]
    EmptyQuery,

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("Vector index or metadata not loaded in memory.")]
    NotLoaded,

    #[error(
        "Index was built with embedding model '{index}' but queries use '{query}'. Rebuild the index."
    )]
    ModelMismatch { index: String, query: String },

    #[error("query embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}
