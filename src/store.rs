//! Process-wide index store.
//!
//! Holds the active [`Snapshot`] as one `Arc` behind a single `RwLock`.
//! Readers clone the `Arc` and release the lock immediately, so a search
//! keeps using the pair it started with even if a reload lands mid-request,
//! and no reader can ever pair one build's vectors with another's metadata.

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

use study_retrieval_core::snapshot::Snapshot;

use crate::artifacts::{read_snapshot, ArtifactError, ArtifactPaths};
use crate::config::Config;

/// Readiness summary for admin endpoints and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub loaded: bool,
    pub chunk_count: usize,
    pub dims: usize,
}

pub struct IndexStore {
    paths: ArtifactPaths,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl IndexStore {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            current: RwLock::new(None),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Read the artifacts and swap them in as one unit.
    ///
    /// On failure the previous snapshot (if any) keeps serving. Returns the
    /// number of chunks loaded.
    pub fn load(&self) -> Result<usize, ArtifactError> {
        match read_snapshot(&self.paths) {
            Ok(snapshot) => {
                let count = snapshot.chunk_count();
                info!(
                    chunks = count,
                    dims = snapshot.dims(),
                    index = %self.paths.index.display(),
                    "index loaded"
                );
                self.install(snapshot);
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "index load failed");
                Err(e)
            }
        }
    }

    /// True iff a snapshot is installed and its metadata is non-empty.
    pub fn loaded(&self) -> bool {
        self.snapshot().is_some_and(|s| s.is_ready())
    }

    /// The current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn install(&self, snapshot: Snapshot) {
        let snapshot = Some(Arc::new(snapshot));
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    pub fn clear(&self) {
        match self.current.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn status(&self) -> StoreStatus {
        match self.snapshot() {
            Some(s) => StoreStatus {
                loaded: s.is_ready(),
                chunk_count: s.chunk_count(),
                dims: s.dims(),
            },
            None => StoreStatus {
                loaded: false,
                chunk_count: 0,
                dims: 0,
            },
        }
    }
}

/// CLI `status`: try to load the artifacts and report readiness.
pub fn run_status(config: &Config) -> anyhow::Result<()> {
    let store = IndexStore::new(ArtifactPaths::from_config(&config.index));
    let load_error = store.load().err();
    let status = store.status();

    println!("status");
    println!("  index: {}", store.paths().index.display());
    println!("  metadata: {}", store.paths().metadata.display());
    println!("  loaded: {}", status.loaded);
    println!("  chunks: {}", status.chunk_count);
    println!("  dims: {}", status.dims);
    if let Some(e) = load_error {
        println!("  error: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::write_artifacts;
    use study_retrieval_core::index::FlatL2Index;
    use study_retrieval_core::models::{Chunk, ChunkKind, JsonFlat};
    use tempfile::TempDir;

    fn flat(text: &str) -> Chunk {
        Chunk {
            source: "b.json".to_string(),
            text: text.to_string(),
            kind: ChunkKind::JsonFlat(JsonFlat {
                file_name: "b".to_string(),
            }),
        }
    }

    fn store_in(tmp: &TempDir) -> IndexStore {
        IndexStore::new(ArtifactPaths::new(
            tmp.path().join("i.bin"),
            tmp.path().join("m.json"),
        ))
    }

    #[test]
    fn test_not_loaded_until_load() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(!store.loaded());
        assert!(matches!(store.load(), Err(ArtifactError::NotFound(_))));
        assert!(!store.loaded());
        assert_eq!(store.status().chunk_count, 0);
    }

    #[test]
    fn test_load_then_failed_reload_keeps_previous() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let index = FlatL2Index::from_vectors(1, &[vec![0.5]]).unwrap();
        write_artifacts(store.paths(), "m", &index, &[flat("kept")]).unwrap();

        assert_eq!(store.load().unwrap(), 1);
        assert!(store.loaded());

        std::fs::remove_file(&store.paths().metadata).unwrap();
        assert!(store.load().is_err());
        assert!(store.loaded());
        assert_eq!(store.snapshot().unwrap().metadata[0].text, "kept");
    }

    #[test]
    fn test_empty_metadata_is_not_ready() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.install(Snapshot::new("m", FlatL2Index::new(3), Vec::new()));
        assert!(!store.loaded());
        assert_eq!(
            store.status(),
            StoreStatus {
                loaded: false,
                chunk_count: 0,
                dims: 3
            }
        );
    }

    #[test]
    fn test_clear_drops_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let index = FlatL2Index::from_vectors(1, &[vec![1.0]]).unwrap();
        store.install(Snapshot::new("m", index, vec![flat("x")]));
        assert!(store.loaded());
        store.clear();
        assert!(!store.loaded());
        assert!(store.snapshot().is_none());
    }
}
