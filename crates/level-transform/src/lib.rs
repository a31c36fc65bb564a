//! Level selection and remapping for forecast Zarr parts.
//!
//! Turns per-level-type source fields into one dataset per collection part:
//!
//! 1. [`stitch`] repairs level axes split across alternate short names
//!    (`10u`/`100u` into `u`), `heightAboveGround` only
//! 2. [`resolve`] projects each configured variable onto output variables
//! 3. [`assemble`] merges every level-type into one [`Dataset`], renaming
//!    the vertical dimension and dropping orphaned coordinates
//! 4. [`plan`] turns requested chunk sizes into a validated chunk plan
//!
//! [`PartBuilder`] drives the steps above for a configured part on top of
//! any [`SourceReader`].
//!
//! [`Dataset`]: nwp_common::Dataset

pub mod assembler;
pub mod chunking;
pub mod config;
pub mod error;
pub mod level_type;
pub mod pipeline;
pub mod resolver;
pub mod squeeze;
pub mod stitcher;
pub mod template;

pub use assembler::assemble;
pub use chunking::{plan, plan_dims, ChunkPlan, ChunkSize, OversizedChunk, Strictness};
pub use config::{CollectionSpec, LevelRequest, LevelSelectionSpec, OrderedMap, PartSpec};
pub use error::{Result, TransformError};
pub use level_type::LevelType;
pub use pipeline::{BuiltPart, PartBuilder, SourceReader};
pub use resolver::{resolve, Resolved, ResolvedField};
pub use squeeze::squeeze_time_invariant;
pub use stitcher::{stitch, SpecialFieldGroup};
pub use template::NameTemplate;

/// Version recorded on every written part.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
