//! Forecast Zarr creator: configuration loading and run orchestration.

pub mod config_loader;
pub mod run;

pub use config_loader::{load_creator_config, CreatorConfig};
pub use run::{run, run_collection, PartStatus, RunOptions, RunReport};
