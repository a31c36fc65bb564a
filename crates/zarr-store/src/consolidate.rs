//! Inline consolidated metadata for Zarr V3 hierarchies.
//!
//! The root group's `zarr.json` receives a `consolidated_metadata` member
//! holding the metadata document of every node below it, keyed by its
//! path relative to the root. Readers can then open the whole hierarchy
//! from a single object.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, StoreError};

/// Metadata document name of every Zarr V3 node.
pub const METADATA_FILE: &str = "zarr.json";

/// Inline the metadata of every node under `root` into the root group.
///
/// Returns the number of nodes consolidated.
pub fn consolidate_metadata(root: &Path) -> Result<usize> {
    let root_file = root.join(METADATA_FILE);
    let mut group = read_json(&root_file)?;

    let mut nodes = Map::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != METADATA_FILE {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        if parent == root {
            continue;
        }
        let Some(key) = relative_key(root, parent) else {
            continue;
        };
        nodes.insert(key, read_json(entry.path())?);
    }

    let count = nodes.len();
    let Value::Object(members) = &mut group else {
        return Err(invalid(&root_file, "root metadata is not an object"));
    };
    if members.get("node_type").and_then(Value::as_str) != Some("group") {
        return Err(invalid(&root_file, "root node is not a group"));
    }
    members.insert(
        "consolidated_metadata".into(),
        json!({
            "kind": "inline",
            "must_understand": false,
            "metadata": nodes,
        }),
    );

    let text = serde_json::to_string_pretty(&group).map_err(|e| invalid(&root_file, e))?;
    fs::write(&root_file, text)?;
    debug!(root = %root.display(), nodes = count, "Consolidated metadata");
    Ok(count)
}

/// Consolidated node documents of a store, keyed by relative path.
pub fn read_consolidated(root: &Path) -> Result<Map<String, Value>> {
    let root_file = root.join(METADATA_FILE);
    let group = read_json(&root_file)?;
    group
        .pointer("/consolidated_metadata/metadata")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| invalid(&root_file, "no consolidated metadata"))
}

/// `/`-separated path of `path` below `root`; empty for `root` itself.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| invalid(path, e))
}

fn invalid(path: &Path, reason: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidMetadata {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_node(dir: &Path, doc: Value) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(METADATA_FILE), doc.to_string()).unwrap();
    }

    #[test]
    fn test_nodes_inlined() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("s.zarr");
        write_node(&root, json!({"zarr_format": 3, "node_type": "group", "attributes": {}}));
        write_node(&root.join("t"), json!({"zarr_format": 3, "node_type": "array", "shape": [2]}));
        write_node(&root.join("sub/u"), json!({"zarr_format": 3, "node_type": "array", "shape": [1]}));
        fs::create_dir_all(root.join("t/c")).unwrap();
        fs::write(root.join("t/c/0"), b"").unwrap();

        assert_eq!(consolidate_metadata(&root).unwrap(), 2);

        let nodes = read_consolidated(&root).unwrap();
        assert_eq!(nodes["t"]["shape"], json!([2]));
        assert_eq!(nodes["sub/u"]["node_type"], "array");

        let group = read_json(&root.join(METADATA_FILE)).unwrap();
        assert_eq!(group["consolidated_metadata"]["kind"], "inline");
        assert_eq!(group["consolidated_metadata"]["must_understand"], false);
    }

    #[test]
    fn test_consolidation_is_repeatable() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("s.zarr");
        write_node(&root, json!({"zarr_format": 3, "node_type": "group"}));
        write_node(&root.join("x"), json!({"zarr_format": 3, "node_type": "array"}));

        consolidate_metadata(&root).unwrap();
        let first = fs::read_to_string(root.join(METADATA_FILE)).unwrap();
        consolidate_metadata(&root).unwrap();
        let second = fs::read_to_string(root.join(METADATA_FILE)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_array_root_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_node(tmp.path(), json!({"zarr_format": 3, "node_type": "array"}));
        assert!(matches!(
            consolidate_metadata(tmp.path()),
            Err(StoreError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_missing_root_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(consolidate_metadata(tmp.path()), Err(StoreError::Io(_))));
    }
}
