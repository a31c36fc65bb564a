//! Object-store (S3) transfer of finished stores.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::debug;
use walkdir::WalkDir;

use crate::consolidate::relative_key;
use crate::error::Result;

/// S3 client for `bucket`.
///
/// Credentials come from the standard AWS environment variables.
pub fn connect_s3(bucket: &str, region: &str, endpoint: Option<&str>) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(region);

    if let Some(endpoint) = endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    Ok(Arc::new(builder.build()?))
}

/// Delete every object below `prefix`. Returns the number deleted.
pub async fn delete_prefix(store: &dyn ObjectStore, prefix: &str) -> Result<usize> {
    let prefix = ObjectPath::from(prefix);
    let locations: Vec<ObjectPath> = store
        .list(Some(&prefix))
        .map_ok(|meta| meta.location)
        .try_collect()
        .await?;

    for location in &locations {
        store.delete(location).await?;
        debug!(path = %location, "Deleted object");
    }
    Ok(locations.len())
}

/// Upload every file below `local_path` to `prefix`.
///
/// Returns the total bytes uploaded.
pub async fn upload_directory(store: &dyn ObjectStore, local_path: &Path, prefix: &str) -> Result<u64> {
    let mut total_size = 0u64;

    for entry in WalkDir::new(local_path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_key(local_path, entry.path()) else {
            continue;
        };

        let location = ObjectPath::from(format!("{}/{}", prefix.trim_end_matches('/'), relative));
        let file_data = tokio::fs::read(entry.path()).await?;
        let file_size = file_data.len() as u64;
        total_size += file_size;

        store.put(&location, Bytes::from(file_data)).await?;
        debug!(path = %location, size = file_size, "Uploaded store file");
    }

    Ok(total_size)
}
