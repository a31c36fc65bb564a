//! Error types for writing Zarr stores.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Zarr error: {0}")]
    Zarr(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid destination {destination:?}: {reason}")]
    InvalidDestination { destination: String, reason: String },

    #[error("Variable {0} still carries preferred chunking hints; clear the encoding before writing")]
    StaleEncoding(String),

    #[error("Array {name} not found in store {}", store.display())]
    MissingArray { name: String, store: PathBuf },

    #[error("Invalid store metadata in {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn zarr(err: impl std::fmt::Display) -> Self {
        Self::Zarr(err.to_string())
    }

    pub fn invalid_destination(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

impl From<walkdir::Error> for StoreError {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
