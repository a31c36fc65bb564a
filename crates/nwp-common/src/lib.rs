//! Common types shared across the forecast Zarr creator crates.
//!
//! The model mirrors the labelled-array view of a forecast dataset:
//!
//! - [`Field`]: one named data array with its own dimensions, coordinates
//!   and CF attributes (what a source reader hands out per variable)
//! - [`Coordinate`]: numeric labels along one or more dimensions
//! - [`Dataset`]: data variables merged onto one shared coordinate table
//!   (what a store writer receives)
//!
//! Missing values are represented as `NaN`.

pub mod coordinate;
pub mod dataset;
pub mod error;
pub mod field;

pub use coordinate::Coordinate;
pub use dataset::{Dataset, Variable};
pub use error::{DatasetError, Result};
pub use field::{Field, FieldSet};

use std::collections::BTreeMap;

/// Attribute map attached to fields, coordinates and datasets.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Name of the generic vertical dimension produced by source readers.
pub const LEVEL_DIM: &str = "level";

/// Name of the forecast time dimension.
pub const TIME_DIM: &str = "time";

/// Storage hints that travel with an array from the source reader.
///
/// Readers record the chunking they would prefer (typically one GRIB
/// message per chunk). These hints must be cleared before a dataset is
/// handed to a store writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    /// Preferred chunk length per dimension name.
    pub preferred_chunks: Option<BTreeMap<String, usize>>,
}

impl Encoding {
    /// Encoding with a preferred chunk length for each listed dimension.
    pub fn with_preferred_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        Self {
            preferred_chunks: Some(chunks.into_iter().map(|(d, n)| (d.into(), n)).collect()),
        }
    }

    /// True when no hints are recorded.
    pub fn is_empty(&self) -> bool {
        self.preferred_chunks.is_none()
    }

    /// Drop every hint.
    pub fn clear(&mut self) {
        self.preferred_chunks = None;
    }

    pub(crate) fn remove_dim(&mut self, dim: &str) {
        if let Some(chunks) = self.preferred_chunks.as_mut() {
            chunks.remove(dim);
        }
    }

    pub(crate) fn rename_dim(&mut self, old: &str, new: &str) {
        if let Some(chunks) = self.preferred_chunks.as_mut() {
            if let Some(len) = chunks.remove(old) {
                chunks.insert(new.to_string(), len);
            }
        }
    }
}

/// Compare two f32 arrays bit for bit (NaN payloads included).
pub(crate) fn bitwise_eq_f32(a: &ndarray::ArrayD<f32>, b: &ndarray::ArrayD<f32>) -> bool {
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Compare two f64 arrays bit for bit (NaN payloads included).
pub(crate) fn bitwise_eq_f64(a: &ndarray::ArrayD<f64>, b: &ndarray::ArrayD<f64>) -> bool {
    a.shape() == b.shape() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}
