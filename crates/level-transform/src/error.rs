//! Error types for the level transform.

use nwp_common::DatasetError;
use thiserror::Error;

/// Errors raised while building a collection part.
///
/// Every variant is fatal for the part being built.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Selection error: level {level} of `{variable}` not present in {level_type} source")]
    Selection {
        variable: String,
        level_type: String,
        level: f64,
    },

    #[error("Variable `{variable}` not present in {level_type} source")]
    VariableNotFound { variable: String, level_type: String },

    #[error("Missing special field `{field}` for level {level}")]
    MissingSpecialField { field: String, level: f64 },

    #[error("Unsupported level type: {0}")]
    UnsupportedLevelType(String),

    #[error("Naming collision: `{name}` produced by both {first} and {second}")]
    NamingCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Chunking error: dimension `{dim}` of length {len} is not divisible by chunk {chunk}")]
    Chunking { dim: String, len: usize, chunk: usize },

    #[error("Invalid name template: {0}")]
    Template(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Field `{field}` is not time invariant: time slice {index} differs from slice 0")]
    TimeVarying { field: String, index: usize },

    #[error("Source reader failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;
