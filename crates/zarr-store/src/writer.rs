//! Zarr V3 hierarchy writer.
//!
//! A dataset becomes one group: global attributes on the group, one
//! float64 array per coordinate and one float32 array per data variable,
//! each carrying its dimension names and CF attributes. Array metadata is
//! consolidated into the root group once every array is written.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use level_transform::ChunkPlan;
use nwp_common::{Attributes, Dataset};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;
use zarrs::array::{Array, ArrayBuilder, ChunkGrid, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::config::StoreConfig;
use crate::consolidate::{consolidate_metadata, relative_key};
use crate::destination::Destination;
use crate::error::{Result, StoreError};
use crate::remote::{connect_s3, delete_prefix, upload_directory};

/// Outcome of writing one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Arrays written (coordinates and data variables).
    pub arrays: usize,
    /// Size of the store on disk, metadata included.
    pub bytes_written: u64,
    /// Where the store ended up.
    pub destination: String,
}

/// Writer for consolidated Zarr V3 stores.
#[derive(Debug, Clone, Default)]
pub struct ZarrStoreWriter {
    config: StoreConfig,
}

impl ZarrStoreWriter {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Write `dataset` to `destination`, replacing any existing store.
    ///
    /// S3 destinations are staged in a temporary directory, the remote
    /// prefix is cleared and the staged files are uploaded. A configured
    /// local copy receives the same store under its own name.
    #[instrument(skip(self, dataset, plan), fields(destination = %destination))]
    pub async fn write(
        &self,
        dataset: &Dataset,
        plan: &ChunkPlan,
        destination: &Destination,
    ) -> Result<WriteSummary> {
        let summary = match destination {
            Destination::Local(path) => {
                let summary = self.write_local(dataset, plan, path)?;
                self.keep_local_copy(path, destination)?;
                summary
            }
            Destination::S3 { bucket, prefix } => {
                let staging = tempfile::Builder::new().prefix("zarr-store-").tempdir()?;
                let staged = staging.path().join(destination.store_name());
                let local = self.write_local(dataset, plan, &staged)?;
                self.keep_local_copy(&staged, destination)?;

                let store = connect_s3(
                    bucket,
                    &self.config.region,
                    self.config.endpoint.as_deref(),
                )?;
                let removed = delete_prefix(store.as_ref(), prefix).await?;
                if removed > 0 {
                    warn!(objects = removed, "Overwriting existing remote store");
                }
                let uploaded = upload_directory(store.as_ref(), &staged, prefix).await?;

                WriteSummary {
                    arrays: local.arrays,
                    bytes_written: uploaded,
                    destination: destination.to_string(),
                }
            }
        };

        info!(
            arrays = summary.arrays,
            bytes = summary.bytes_written,
            "Wrote store"
        );
        Ok(summary)
    }

    /// Write `dataset` to a local directory, replacing any existing store.
    #[instrument(skip(self, dataset, plan), fields(path = %path.display()))]
    pub fn write_local(
        &self,
        dataset: &Dataset,
        plan: &ChunkPlan,
        path: &Path,
    ) -> Result<WriteSummary> {
        check_encoding(dataset)?;
        self.config.validate()?;

        if path.exists() {
            warn!("Overwriting existing store");
            fs::remove_dir_all(path)?;
        }
        fs::create_dir_all(path)?;

        let store = Arc::new(FilesystemStore::new(path).map_err(StoreError::zarr)?);

        let group = GroupBuilder::new()
            .attributes(dataset.attrs.clone())
            .build(store.clone(), "/")
            .map_err(StoreError::zarr)?;
        group.store_metadata().map_err(StoreError::zarr)?;

        let mut arrays = 0usize;

        for (name, coord) in dataset.coords() {
            let shape = coord.values.shape();
            let chunk_shape = shape.iter().map(|&n| n.max(1) as u64).collect();
            let array = self.build_array(
                &store,
                name,
                &coord.dims,
                shape,
                chunk_shape,
                (DataType::Float64, std::mem::size_of::<f64>()),
                FillValue::from(f64::NAN),
                &coord.attrs,
            )?;
            let data: Vec<f64> = coord.values.iter().copied().collect();
            store_all(&array, &data)?;
            debug!(coordinate = %name, shape = ?shape, "Wrote coordinate");
            arrays += 1;
        }

        for (name, var) in dataset.data_vars() {
            let shape = var.values.shape();
            let chunk_shape = plan.chunk_shape(&var.dims, shape);
            let array = self.build_array(
                &store,
                name,
                &var.dims,
                shape,
                chunk_shape.clone(),
                (DataType::Float32, std::mem::size_of::<f32>()),
                FillValue::from(f32::NAN),
                &var.attrs,
            )?;
            let data: Vec<f32> = var.values.iter().copied().collect();
            store_all(&array, &data)?;
            debug!(variable = %name, shape = ?shape, chunks = ?chunk_shape, "Wrote variable");
            arrays += 1;
        }

        consolidate_metadata(path)?;

        Ok(WriteSummary {
            arrays,
            bytes_written: directory_size(path)?,
            destination: path.display().to_string(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_array(
        &self,
        store: &Arc<FilesystemStore>,
        name: &str,
        dims: &[String],
        shape: &[usize],
        chunk_shape: Vec<u64>,
        (data_type, typesize): (DataType, usize),
        fill_value: FillValue,
        attrs: &Attributes,
    ) -> Result<Array<FilesystemStore>> {
        let chunk_grid: ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| StoreError::Zarr(format!("invalid chunk shape for {name}: {e:?}")))?;

        let mut builder = ArrayBuilder::new(
            shape.iter().map(|&n| n as u64).collect(),
            data_type,
            chunk_grid,
            fill_value,
        );
        builder
            .attributes(attrs.clone())
            .dimension_names(Some(dims.iter().map(String::as_str)));

        let codecs = self.config.codecs(typesize)?;
        if !codecs.is_empty() {
            builder.bytes_to_bytes_codecs(codecs);
        }

        let array = builder
            .build(store.clone(), &format!("/{name}"))
            .map_err(StoreError::zarr)?;
        array.store_metadata().map_err(StoreError::zarr)?;
        Ok(array)
    }

    /// Copy a finished store into the configured local-copy directory.
    fn keep_local_copy(&self, written: &Path, destination: &Destination) -> Result<()> {
        let Some(dir) = &self.config.local_copy else {
            return Ok(());
        };
        let target = dir.join(destination.store_name());
        if target == written {
            return Ok(());
        }
        copy_store(written, &target)?;
        info!(path = %target.display(), "Kept local copy");
        Ok(())
    }
}

/// Reject datasets that still carry the reader's preferred chunking.
fn check_encoding(dataset: &Dataset) -> Result<()> {
    let stale = dataset
        .data_vars()
        .iter()
        .find(|(_, v)| !v.encoding.is_empty())
        .map(|(name, _)| name)
        .or_else(|| {
            dataset
                .coords()
                .iter()
                .find(|(_, c)| !c.encoding.is_empty())
                .map(|(name, _)| name)
        });
    match stale {
        Some(name) => Err(StoreError::StaleEncoding(name.clone())),
        None => Ok(()),
    }
}

fn store_all<T>(array: &Array<FilesystemStore>, data: &[T]) -> Result<()>
where
    T: zarrs::array::Element,
{
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    array
        .store_array_subset_elements(&subset, data)
        .map_err(StoreError::zarr)
}

/// Copy a store directory, replacing `dst`.
pub fn copy_store(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        warn!(path = %dst.display(), "Overwriting existing local copy");
        fs::remove_dir_all(dst)?;
    }
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let Some(key) = relative_key(src, entry.path()) else {
            continue;
        };
        let target = if key.is_empty() { dst.to_path_buf() } else { dst.join(&key) };
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn directory_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
