//! Flat (brute-force) vector index over squared Euclidean distance.
//!
//! Rows are stored contiguously in insertion order; row `i` of the index is
//! position `i` of the metadata table it was built with. Every query is an
//! exhaustive scan, so results are exact and deterministic.
//!
//! # Artifact format
//!
//! ```text
//! offset  size        field
//! 0       4           magic  b"SRFL"
//! 4       4           format version (u32 LE)
//! 8       4           dims (u32 LE)
//! 12      8           rows (u64 LE)
//! 20      32          SHA-256 of the metadata artifact bytes
//! 52      2           model name length n (u16 LE)
//! 54      n           model name (UTF-8)
//! 54+n    rows×dims×4 f32 LE values, row-major
//! ```
//!
//! The embedded digest ties a vector file to the exact metadata file it
//! was written with, so a loader can refuse a mismatched pair instead of
//! serving misattributed hits. The model name records which embedder
//! produced the rows; queries must be embedded by the same one.

use sha2::{Digest, Sha256};
use std::cmp::Ordering;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::IndexError;

const MAGIC: &[u8; 4] = b"SRFL";
const FORMAT_VERSION: u32 = 2;
const FIXED_HEADER_SIZE: usize = 54;

/// SHA-256 digest of a metadata artifact, as embedded in the index header.
pub type MetadataDigest = [u8; 32];

/// Identity stamped into an index artifact alongside its vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStamp {
    pub digest: MetadataDigest,
    /// Name of the embedding model that produced every row.
    pub model: String,
}

/// Compute the digest of serialized metadata bytes.
pub fn metadata_digest(bytes: &[u8]) -> MetadataDigest {
    Sha256::digest(bytes).into()
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// One hit of a nearest-neighbor query.
///
/// `row` is `-1` for padding entries produced when fewer than `k` rows
/// exist; callers must bounds-check it against their metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub row: i64,
}

/// Exhaustive squared-L2 index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dims: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Create an empty index for vectors of `dims` components.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    /// Build an index from vectors in row order.
    pub fn from_vectors(dims: usize, vectors: &[Vec<f32>]) -> Result<Self, IndexError> {
        let mut index = Self::new(dims);
        index.data.reserve(dims * vectors.len());
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    /// Append one vector as the next row.
    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dims(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored vector at `row`, if any.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dims;
        Some(&self.data[start..start + self.dims])
    }

    /// Return exactly `k` neighbors of `query`, nearest first.
    ///
    /// Ties are broken by ascending row. When `k` exceeds the number of
    /// rows the tail is padded with `row = -1` and infinite distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dims(query)?;

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dims.max(1))
            .enumerate()
            .map(|(row, v)| Neighbor {
                distance: l2_squared(query, v),
                row: row as i64,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then(a.row.cmp(&b.row))
        });
        hits.truncate(k);
        while hits.len() < k {
            hits.push(Neighbor {
                distance: f32::INFINITY,
                row: -1,
            });
        }
        Ok(hits)
    }

    /// Serialize to the artifact format, stamping the metadata digest and
    /// the embedding model name.
    pub fn to_bytes(&self, stamp: &ArtifactStamp) -> Result<Vec<u8>, IndexError> {
        let dims = u32::try_from(self.dims).map_err(|_| IndexError::HeaderOverflow)?;
        let model = stamp.model.as_bytes();
        let model_len = u16::try_from(model.len()).map_err(|_| IndexError::HeaderOverflow)?;

        let mut out = Vec::with_capacity(FIXED_HEADER_SIZE + model.len() + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&dims.to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(&stamp.digest);
        out.extend_from_slice(&model_len.to_le_bytes());
        out.extend_from_slice(model);
        out.extend_from_slice(&vec_to_blob(&self.data));
        Ok(out)
    }

    /// Parse the artifact format, returning the index and its stamp.
    ///
    /// Header values are untrusted: any size that does not fit in memory
    /// arithmetic is reported as truncation, never a panic.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, ArtifactStamp), IndexError> {
        if bytes.len() < FIXED_HEADER_SIZE {
            return Err(IndexError::Truncated {
                expected: FIXED_HEADER_SIZE,
                found: bytes.len(),
            });
        }
        if &bytes[0..4] != MAGIC {
            return Err(IndexError::BadMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion(version));
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut rows_bytes = [0u8; 8];
        rows_bytes.copy_from_slice(&bytes[12..20]);
        let rows = u64::from_le_bytes(rows_bytes);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[20..52]);
        let model_len = u16::from_le_bytes([bytes[52], bytes[53]]) as usize;

        let data_start = FIXED_HEADER_SIZE + model_len;
        let expected = usize::try_from(rows)
            .ok()
            .and_then(|rows| rows.checked_mul(dims))
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(data_start));
        let Some(expected) = expected else {
            return Err(IndexError::Truncated {
                expected: usize::MAX,
                found: bytes.len(),
            });
        };
        if bytes.len() != expected {
            return Err(IndexError::Truncated {
                expected,
                found: bytes.len(),
            });
        }

        let model = std::str::from_utf8(&bytes[FIXED_HEADER_SIZE..data_start])
            .map_err(|_| IndexError::BadModelName)?
            .to_string();
        let data = blob_to_vec(&bytes[data_start..]);
        Ok((Self { dims, data }, ArtifactStamp { digest, model }))
    }

    fn check_dims(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                got: vector.len(),
            });
        }
        Ok(())
    }
}
