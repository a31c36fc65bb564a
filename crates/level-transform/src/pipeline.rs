//! Part building on top of a source reader.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use nwp_common::{Dataset, FieldSet};
use tracing::{debug, info, instrument};

use crate::assembler::assemble;
use crate::chunking::{plan, ChunkPlan};
use crate::config::{CollectionSpec, PartSpec};
use crate::error::{Result, TransformError};
use crate::level_type::LevelType;
use crate::squeeze::squeeze_time_invariant;
use crate::stitcher::stitch;
use crate::VERSION;

/// Upstream collaborator handing out the fields of one level-type for
/// the current analysis time.
pub trait SourceReader {
    type Error: std::error::Error + Send + Sync + 'static;

    fn read_level_type(
        &mut self,
        level_type: LevelType,
    ) -> std::result::Result<FieldSet, Self::Error>;
}

/// Result of building one collection part.
#[derive(Debug, Clone)]
pub struct BuiltPart {
    /// Part name, used as the dataset identifier of the store.
    pub name: String,
    /// Assembled dataset with encoding hints cleared.
    pub dataset: Dataset,
    /// Resolved chunk plan for the dataset.
    pub plan: ChunkPlan,
}

/// Builds configured parts, reading each level-type at most once.
pub struct PartBuilder<'a, R> {
    collection: &'a CollectionSpec,
    reader: R,
    cache: HashMap<LevelType, FieldSet>,
}

impl<'a, R: SourceReader> PartBuilder<'a, R> {
    pub fn new(collection: &'a CollectionSpec, reader: R) -> Self {
        Self {
            collection,
            reader,
            cache: HashMap::new(),
        }
    }

    /// Source fields of a level-type, stitched for `heightAboveGround`.
    fn source(&mut self, level_type: LevelType) -> Result<&FieldSet> {
        match self.cache.entry(level_type) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let fields = self
                    .reader
                    .read_level_type(level_type)
                    .map_err(|e| TransformError::Source(Box::new(e)))?;
                debug!(level_type = %level_type, fields = fields.len(), "Read source fields");
                let fields = if level_type == LevelType::HeightAboveGround {
                    stitch(fields, &self.collection.special_field_groups())?
                } else {
                    fields
                };
                Ok(entry.insert(fields))
            }
        }
    }

    /// Resolve, assemble and chunk-plan one part.
    ///
    /// Nothing is written; any error aborts this part only.
    #[instrument(skip(self, part), fields(part = %part.name))]
    pub fn build_part(&mut self, part: &PartSpec) -> Result<BuiltPart> {
        let mut outputs = Vec::with_capacity(part.selections.len());
        for selection in &part.selections {
            let source = self.source(selection.level_type)?;
            let mut resolved = selection.resolve(source)?;
            if selection.level_type == LevelType::Constants {
                for output in resolved.fields.values_mut() {
                    output.field = squeeze_time_invariant(output.field.clone())?;
                }
            }
            outputs.push(resolved);
        }

        let mut dataset = assemble(&outputs)?;
        dataset
            .attrs
            .insert("zarr_creator_version".into(), VERSION.into());
        if !self.collection.description.is_empty() {
            dataset
                .attrs
                .insert("description".into(), self.collection.description.clone().into());
        }
        dataset.clear_encoding();

        let plan = plan(
            &dataset,
            &part.chunking(self.collection),
            part.strictness(self.collection),
        )?;

        info!(
            variables = dataset.len(),
            dims = ?dataset.dim_sizes(),
            chunks = ?plan.chunks,
            "Built part"
        );

        Ok(BuiltPart {
            name: part.name.clone(),
            dataset,
            plan,
        })
    }

    /// Build every part of the collection in order.
    pub fn build_all(&mut self) -> Vec<(String, Result<BuiltPart>)> {
        let collection = self.collection;
        collection
            .parts
            .iter()
            .map(|part| (part.name.clone(), self.build_part(part)))
            .collect()
    }

    pub fn into_reader(self) -> R {
        self.reader
    }
}
