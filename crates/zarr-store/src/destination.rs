//! Store destinations: local directories or S3 prefixes.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};

/// Default destination template of the forecast bucket.
pub const DEFAULT_TEMPLATE: &str = "s3://harmonie-zarr/dini/{member}/{t_analysis}/{dataset_id}.zarr";

/// Default ensemble member.
pub const DEFAULT_MEMBER: &str = "control";

const STORE_SUFFIX: &str = ".zarr";
const S3_SCHEME: &str = "s3://";
const PLACEHOLDERS: [&str; 3] = ["member", "t_analysis", "dataset_id"];

/// Where a store is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Directory on the local filesystem.
    Local(PathBuf),
    /// Key prefix inside an S3 bucket.
    S3 { bucket: String, prefix: String },
}

impl Destination {
    /// Parse `s3://bucket/prefix.zarr` or a local path ending in `.zarr`.
    pub fn parse(s: &str) -> Result<Self> {
        let destination = match s.strip_prefix(S3_SCHEME) {
            Some(rest) => {
                let (bucket, prefix) = rest
                    .split_once('/')
                    .ok_or_else(|| StoreError::invalid_destination(s, "missing key prefix"))?;
                let prefix = prefix.trim_matches('/');
                if bucket.is_empty() || prefix.is_empty() {
                    return Err(StoreError::invalid_destination(s, "empty bucket or prefix"));
                }
                Self::S3 {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                }
            }
            None if s.contains("://") => {
                return Err(StoreError::invalid_destination(s, "unsupported URL scheme"));
            }
            None => Self::Local(PathBuf::from(s.trim_end_matches('/'))),
        };

        if !destination.store_name().ends_with(STORE_SUFFIX) {
            return Err(StoreError::invalid_destination(s, "must end in .zarr"));
        }
        Ok(destination)
    }

    /// Render a destination template and parse the result.
    ///
    /// Placeholders are `{member}`, `{t_analysis}` and `{dataset_id}`.
    pub fn from_template(
        template: &str,
        member: &str,
        t_analysis: DateTime<Utc>,
        dataset_id: &str,
    ) -> Result<Self> {
        let t_analysis = format_t_analysis(t_analysis);
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let end = rest[start..]
                .find('}')
                .ok_or_else(|| StoreError::invalid_destination(template, "unclosed placeholder"))?;
            let name = &rest[start + 1..start + end];
            let value = match name {
                "member" => member,
                "t_analysis" => t_analysis.as_str(),
                "dataset_id" => dataset_id,
                _ => {
                    return Err(StoreError::invalid_destination(
                        template,
                        format!("unknown placeholder {{{name}}}, expected one of {PLACEHOLDERS:?}"),
                    ))
                }
            };
            rendered.push_str(value);
            rest = &rest[start + end + 1..];
        }
        rendered.push_str(rest);
        Self::parse(&rendered)
    }

    /// Last path component, e.g. `height_levels.zarr`.
    pub fn store_name(&self) -> &str {
        match self {
            Self::Local(path) => path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            Self::S3 { prefix, .. } => prefix.rsplit('/').next().unwrap_or_default(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::S3 { .. } => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::S3 { bucket, prefix } => write!(f, "{S3_SCHEME}{bucket}/{prefix}"),
        }
    }
}

/// Analysis time as used in store paths: `2025-02-17T010000Z`.
pub fn format_t_analysis(t_analysis: DateTime<Utc>) -> String {
    t_analysis.format("%Y-%m-%dT%H%M%SZ").to_string()
}
