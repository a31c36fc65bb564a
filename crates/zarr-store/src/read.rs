//! Reading arrays back from a local store.

use std::path::Path;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use nwp_common::Attributes;
use serde_json::Value;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::consolidate::{read_json, METADATA_FILE};
use crate::error::{Result, StoreError};

/// One array of a store with its dimension names and attributes.
#[derive(Debug, Clone)]
pub struct StoredArray<T> {
    pub dims: Vec<String>,
    pub values: ArrayD<T>,
    pub attrs: Attributes,
}

/// Read a float32 data variable.
pub fn read_variable(root: &Path, name: &str) -> Result<StoredArray<f32>> {
    let (dims, attrs, array) = open(root, name)?;
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    let data: Vec<f32> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(StoreError::zarr)?;
    Ok(StoredArray {
        dims,
        values: to_ndarray(&array, data)?,
        attrs,
    })
}

/// Read a float64 coordinate.
pub fn read_coordinate(root: &Path, name: &str) -> Result<StoredArray<f64>> {
    let (dims, attrs, array) = open(root, name)?;
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    let data: Vec<f64> = array
        .retrieve_array_subset_elements(&subset)
        .map_err(StoreError::zarr)?;
    Ok(StoredArray {
        dims,
        values: to_ndarray(&array, data)?,
        attrs,
    })
}

/// Attributes of the root group.
pub fn read_group_attributes(root: &Path) -> Result<Attributes> {
    let doc = read_json(&root.join(METADATA_FILE))?;
    Ok(attributes(&doc))
}

fn open(root: &Path, name: &str) -> Result<(Vec<String>, Attributes, Array<FilesystemStore>)> {
    let metadata_path = root.join(name).join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(StoreError::MissingArray {
            name: name.to_string(),
            store: root.to_path_buf(),
        });
    }
    let doc = read_json(&metadata_path)?;
    let dims = doc
        .get("dimension_names")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .map(|n| n.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    let store = Arc::new(FilesystemStore::new(root).map_err(StoreError::zarr)?);
    let array = Array::open(store, &format!("/{name}")).map_err(StoreError::zarr)?;
    Ok((dims, attributes(&doc), array))
}

fn attributes(doc: &Value) -> Attributes {
    doc.get("attributes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn to_ndarray<T>(array: &Array<FilesystemStore>, data: Vec<T>) -> Result<ArrayD<T>> {
    let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(StoreError::zarr)
}
