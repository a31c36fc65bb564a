//! GRIB2 source reader for the forecast Zarr creator.
//!
//! Reads a forecast run directory with the `grib` crate and hands out
//! one [`FieldSet`](nwp_common::FieldSet) per level-type through the
//! [`SourceReader`](level_transform::SourceReader) seam. Short names and
//! parameter identifiers come from an explicit [`ParameterTable`].

pub mod cf;
pub mod collect;
pub mod error;
pub mod projection;
pub mod reader;
pub mod surface;
pub mod table;

pub use cf::copy_cf_standard_names;
pub use collect::{DecodedMessage, FieldCollector};
pub use error::{Result, SourceError};
pub use projection::GridMapping;
pub use reader::{discover_files, GribSourceReader, SourceConfig, DEFAULT_RUN_DIR_PATTERN};
pub use surface::classify_surface;
pub use table::{ParamKey, ParameterEntry, ParameterTable};
