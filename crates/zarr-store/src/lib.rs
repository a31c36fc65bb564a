//! Zarr V3 store writer for assembled forecast datasets.
//!
//! Each dataset is written as one consolidated group, locally or to an
//! S3 prefix (staged locally, then uploaded). Existing stores at the
//! destination are replaced.

pub mod config;
pub mod consolidate;
pub mod destination;
pub mod error;
pub mod read;
pub mod remote;
pub mod writer;

pub use config::{StoreConfig, ZarrCompression, DEFAULT_REGION};
pub use consolidate::{consolidate_metadata, read_consolidated, METADATA_FILE};
pub use destination::{format_t_analysis, Destination, DEFAULT_MEMBER, DEFAULT_TEMPLATE};
pub use error::{Result, StoreError};
pub use read::{read_coordinate, read_group_attributes, read_variable, StoredArray};
pub use remote::{connect_s3, delete_prefix, upload_directory};
pub use writer::{copy_store, WriteSummary, ZarrStoreWriter};
