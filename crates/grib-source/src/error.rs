//! Error types for reading GRIB2 run directories.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode GRIB2 data: {0}")]
    Grib(String),

    #[error("Grid mismatch for {field}: expected {expected:?}, found {found:?}")]
    GridMismatch {
        field: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Run directory not found: {}", .0.display())]
    RunDirectoryNotFound(PathBuf),

    #[error("Invalid run directory pattern: {0}")]
    InvalidRunDirPattern(String),

    #[error("Invalid parameter table: {0}")]
    InvalidTable(String),

    #[error("Failed to build field: {0}")]
    Dataset(#[from] nwp_common::DatasetError),
}

pub type Result<T> = std::result::Result<T, SourceError>;
