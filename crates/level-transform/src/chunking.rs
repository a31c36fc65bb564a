//! Chunk-plan validation.
//!
//! A requested chunk length larger than its dimension is clamped with a
//! warning. In strict mode every dimension must then split into whole
//! chunks.

use std::collections::BTreeMap;

use nwp_common::Dataset;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TransformError};

/// Requested chunk length for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkSize {
    /// A fixed chunk length (`time: 1`).
    Length(usize),
    /// Split the dimension into `split` chunks (`x: {split: 2}`).
    Split { split: usize },
}

impl ChunkSize {
    /// Requested length for a dimension of `len` elements.
    pub fn requested(&self, len: usize) -> usize {
        match *self {
            ChunkSize::Length(n) => n,
            ChunkSize::Split { split } => (len / split.max(1)).max(1),
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            ChunkSize::Length(n) => n > 0,
            ChunkSize::Split { split } => split > 0,
        }
    }
}

/// Whether divisibility is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Clamp oversized requests and accept ragged final chunks.
    #[default]
    Relaxed,
    /// Additionally require `len % chunk == 0` for every dimension.
    Strict,
}

impl Strictness {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            Strictness::Strict
        } else {
            Strictness::Relaxed
        }
    }
}

/// A request that was clamped to the dimension length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedChunk {
    pub dim: String,
    pub requested: usize,
    pub actual: usize,
}

/// Resolved chunk length per dimension, plus the clamps applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunks: BTreeMap<String, usize>,
    pub warnings: Vec<OversizedChunk>,
}

impl ChunkPlan {
    /// Chunk shape for an array with the given dimensions.
    ///
    /// Dimensions missing from the plan span one chunk.
    pub fn chunk_shape(&self, dims: &[String], shape: &[usize]) -> Vec<u64> {
        dims.iter()
            .zip(shape)
            .map(|(dim, &len)| self.chunks.get(dim).copied().unwrap_or(len).max(1) as u64)
            .collect()
    }
}

/// Plan chunks for every dimension of `dataset`.
pub fn plan(
    dataset: &Dataset,
    requested: &BTreeMap<String, ChunkSize>,
    strictness: Strictness,
) -> Result<ChunkPlan> {
    plan_dims(dataset.dim_sizes(), requested, strictness)
}

/// Plan chunks for explicit dimension lengths.
pub fn plan_dims(
    dims: &BTreeMap<String, usize>,
    requested: &BTreeMap<String, ChunkSize>,
    strictness: Strictness,
) -> Result<ChunkPlan> {
    for dim in requested.keys().filter(|d| !dims.contains_key(*d)) {
        debug!(dim = %dim, "Chunk request for absent dimension ignored");
    }

    let mut plan = ChunkPlan::default();
    for (dim, &len) in dims {
        let chunk = match requested.get(dim) {
            Some(size) if !size.is_valid() => {
                return Err(TransformError::InvalidConfig(format!(
                    "chunk size for `{dim}` must be positive"
                )))
            }
            Some(size) => {
                let want = size.requested(len);
                if want > len {
                    warn!(
                        dim = %dim,
                        requested = want,
                        actual = len,
                        "Requested chunk exceeds dimension length, clamping"
                    );
                    plan.warnings.push(OversizedChunk {
                        dim: dim.clone(),
                        requested: want,
                        actual: len,
                    });
                    len
                } else {
                    want
                }
            }
            None => len,
        };
        plan.chunks.insert(dim.clone(), chunk);
    }

    if strictness == Strictness::Strict {
        for (dim, &chunk) in &plan.chunks {
            let len = dims[dim];
            // A zero-length dimension has nothing to partition.
            if len == 0 {
                continue;
            }
            if len % chunk != 0 {
                return Err(TransformError::Chunking {
                    dim: dim.clone(),
                    len,
                    chunk,
                });
            }
        }
    }

    Ok(plan)
}
