//! Nearest-neighbor search with score normalization and text reconstruction.
//!
//! The algorithm has no filesystem or configuration dependencies: the
//! caller supplies the current [`Snapshot`], the embedding provider the
//! index was built with, and a [`TextSource`] able to re-read a chunk's
//! passage from its source document.
//!
//! # Algorithm
//!
//! 1. Reject blank queries and an unloaded or empty snapshot.
//! 2. Refuse an embedder other than the one the index was built with, then
//!    embed the query.
//! 3. Fetch exactly `top_k` neighbors from the flat L2 index (nearest first).
//! 4. Drop any neighbor whose row falls outside the metadata table.
//! 5. Score each hit: `normalized = round(100 / (1 + distance), 2)`.
//! 6. Replace the stored text with a fresh read of the source, falling back
//!    to the stored snapshot when the source no longer resolves.

use serde::Serialize;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::SearchError;
use crate::models::Chunk;
use crate::snapshot::Snapshot;

/// A search hit: the chunk's metadata with reconstructed text and scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Raw squared L2 distance. Lower is closer.
    pub score: f64,
    /// Relevance in `(0, 100]`. Higher is closer.
    pub normalized_score: f64,
}

/// Re-reads the current passage for a chunk from wherever its source lives.
pub trait TextSource: Send + Sync {
    fn reconstruct(&self, chunk: &Chunk) -> anyhow::Result<String>;
}

/// A [`TextSource`] that always answers with the text stored at build time.
pub struct StoredText;

impl TextSource for StoredText {
    fn reconstruct(&self, chunk: &Chunk) -> anyhow::Result<String> {
        Ok(chunk.text.clone())
    }
}

/// Fresh text for `chunk`, or its stored snapshot if reconstruction fails.
pub fn resolve_text(source: &dyn TextSource, chunk: &Chunk) -> String {
    match source.reconstruct(chunk) {
        Ok(text) => text,
        Err(e) => {
            debug!(source = %chunk.source, error = %e, "reconstruction failed, using stored text");
            chunk.text.clone()
        }
    }
}

/// Map a squared L2 distance to a bounded, higher-is-better score.
///
/// `0.0` maps to exactly `100.0`; larger distances approach (but never
/// reach) `0.0`. The result is rounded to two decimals and kept inside
/// `(0, 100]`, with `100.0` reserved for an exact match. A non-finite
/// distance gets the minimum score.
pub fn normalize_score(distance: f64) -> f64 {
    if !distance.is_finite() {
        return 0.01;
    }
    let distance = distance.max(0.0);
    let rounded = (100.0 / (1.0 + distance) * 100.0).round() / 100.0;
    if distance > 0.0 && rounded >= 100.0 {
        99.99
    } else if rounded <= 0.0 {
        0.01
    } else {
        rounded
    }
}

/// Run a nearest-neighbor search against `snapshot`.
///
/// `snapshot` is `None` when no index has been loaded. Results come back in
/// index order (ascending distance); callers that filter or re-sort do so
/// on their own copy.
pub async fn search(
    snapshot: Option<&Snapshot>,
    embedder: &dyn EmbeddingProvider,
    texts: &dyn TextSource,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchResult>, SearchError> {
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if top_k == 0 {
        return Err(SearchError::InvalidTopK);
    }
    let snapshot = match snapshot {
        Some(s) if s.is_ready() => s,
        _ => return Err(SearchError::NotLoaded),
    };
    if snapshot.model != embedder.model_name() {
        return Err(SearchError::ModelMismatch {
            index: snapshot.model.clone(),
            query: embedder.model_name().to_string(),
        });
    }

    let query_vec = embedder
        .embed_one(query)
        .await
        .map_err(|e| SearchError::Embedding(format!("{:#}", e)))?;

    let neighbors = snapshot.index.search(&query_vec, top_k)?;

    let mut results = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        let Some(chunk) = usize::try_from(neighbor.row)
            .ok()
            .and_then(|row| snapshot.metadata.get(row))
        else {
            debug!(row = neighbor.row, "neighbor outside metadata table, skipping");
            continue;
        };

        let score = f64::from(neighbor.distance);
        let text = resolve_text(texts, chunk);
        results.push(SearchResult {
            chunk: Chunk {
                text,
                ..chunk.clone()
            },
            score,
            normalized_score: normalize_score(score),
        });
    }

    Ok(results)
}
