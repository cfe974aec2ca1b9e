//! Persisted index artifacts.
//!
//! A build produces two files:
//!
//! - the **metadata artifact**: a JSON array of chunks, row-aligned with the index;
//! - the **index artifact**: the binary flat index, whose header carries the
//!   SHA-256 of the metadata artifact's exact bytes and the name of the
//!   embedding model that produced the rows.
//!
//! Each file is written to a sibling temp file and renamed into place.
//! Metadata is renamed first and the index last, so a reader that sees the
//! new index always sees the metadata it was stamped with. A crash between
//! the two renames leaves a digest mismatch, which [`read_snapshot`]
//! rejects rather than serving misaligned rows.

use std::path::{Path, PathBuf};

use study_retrieval_core::error::IndexError;
use study_retrieval_core::index::{metadata_digest, ArtifactStamp, FlatL2Index};
use study_retrieval_core::models::Chunk;
use study_retrieval_core::snapshot::Snapshot;

use crate::config::IndexConfig;

/// Locations of the two artifacts that make up one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            metadata: metadata.into(),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(&config.index_path, &config.metadata_path)
    }

    pub fn exist(&self) -> bool {
        self.index.is_file() && self.metadata.is_file()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid index artifact: {0}")]
    Index(#[from] IndexError),

    #[error("index and metadata are misaligned: {0}")]
    Misaligned(String),
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ArtifactError::NotFound(path.to_path_buf())
    } else {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `index` and `metadata` as a matched pair, recording `model` as
/// the embedder of every row.
///
/// Fails without writing anything if the row counts differ.
pub fn write_artifacts(
    paths: &ArtifactPaths,
    model: &str,
    index: &FlatL2Index,
    metadata: &[Chunk],
) -> Result<(), ArtifactError> {
    if index.len() != metadata.len() {
        return Err(ArtifactError::Misaligned(format!(
            "index has {} rows, metadata has {} chunks",
            index.len(),
            metadata.len()
        )));
    }

    let metadata_bytes = serde_json::to_vec_pretty(metadata)?;
    let stamp = ArtifactStamp {
        digest: metadata_digest(&metadata_bytes),
        model: model.to_string(),
    };
    let index_bytes = index.to_bytes(&stamp)?;

    write_replace(&paths.metadata, &metadata_bytes)?;
    write_replace(&paths.index, &index_bytes)?;
    Ok(())
}

/// Read and verify a snapshot from disk.
pub fn read_snapshot(paths: &ArtifactPaths) -> Result<Snapshot, ArtifactError> {
    let index_bytes = std::fs::read(&paths.index).map_err(|e| io_error(&paths.index, e))?;
    let metadata_bytes =
        std::fs::read(&paths.metadata).map_err(|e| io_error(&paths.metadata, e))?;

    let (index, stamped) = FlatL2Index::from_bytes(&index_bytes)?;
    if stamped.digest != metadata_digest(&metadata_bytes) {
        return Err(ArtifactError::Misaligned(format!(
            "{} was not written with {}",
            paths.index.display(),
            paths.metadata.display()
        )));
    }

    let metadata: Vec<Chunk> = serde_json::from_slice(&metadata_bytes)?;
    if metadata.len() != index.len() {
        return Err(ArtifactError::Misaligned(format!(
            "index has {} rows, metadata has {} chunks",
            index.len(),
            metadata.len()
        )));
    }

    Ok(Snapshot::new(stamped.model, index, metadata))
}

fn write_replace(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
    Ok(())
}
