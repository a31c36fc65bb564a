//! Error types for dataset manipulation.

use thiserror::Error;

/// Errors raised by field and dataset operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// A named variable is not present.
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// A requested coordinate value is not on the axis.
    #[error("level {level} not found on dimension `{dim}` of `{field}`")]
    LevelNotFound {
        field: String,
        dim: String,
        level: f64,
    },

    /// A dimension (or its index coordinate) is missing.
    #[error("dimension `{dim}` not found on `{name}`")]
    DimensionNotFound { name: String, dim: String },

    /// A dimension already exists where a new one was to be created.
    #[error("dimension `{dim}` already exists on `{name}`")]
    DimensionExists { name: String, dim: String },

    /// Dimension sizes disagree.
    #[error("dimension `{dim}` has size {expected} but {actual} on `{name}`")]
    DimensionMismatch {
        name: String,
        dim: String,
        expected: usize,
        actual: usize,
    },

    /// Two coordinates with the same name carry different labels.
    #[error("coordinate `{0}` conflicts with an existing coordinate of the same name")]
    CoordinateConflict(String),

    /// Array shape does not fit the declared dimensions.
    #[error("shape mismatch for `{name}`: {reason}")]
    ShapeMismatch { name: String, reason: String },
}

impl DatasetError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a DimensionNotFound error.
    pub fn dimension_not_found(name: impl Into<String>, dim: impl Into<String>) -> Self {
        Self::DimensionNotFound {
            name: name.into(),
            dim: dim.into(),
        }
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
