//! Configuration for the Zarr store writer.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;

use crate::error::{Result, StoreError};

/// Default S3 region of the forecast bucket.
pub const DEFAULT_REGION: &str = "eu-central-1";

/// Configuration for the store writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Compression codec for every array.
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub compression_level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,

    /// S3 region for object-store destinations.
    pub region: String,

    /// Custom S3 endpoint (MinIO, localstack).
    pub endpoint: Option<String>,

    /// Also keep a copy of every store under this directory.
    pub local_copy: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: ZarrCompression::BloscZstd,
            compression_level: 1,
            shuffle: true,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            local_copy: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from environment variables that are set.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("ZARR_COMPRESSION") {
            self.compression = ZarrCompression::parse_lenient(&val);
        }

        if let Ok(val) = std::env::var("ZARR_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                self.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("ZARR_SHUFFLE") {
            self.shuffle = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.compression != ZarrCompression::None
            && (self.compression_level == 0 || self.compression_level > 9)
        {
            return Err(StoreError::Config(
                "compression_level must be 1-9".to_string(),
            ));
        }

        if self.region.is_empty() {
            return Err(StoreError::Config("region must not be empty".to_string()));
        }

        Ok(())
    }

    /// Bytes-to-bytes codecs for an array with elements of `typesize` bytes.
    pub fn codecs(&self, typesize: usize) -> Result<Vec<Arc<dyn BytesToBytesCodecTraits>>> {
        let compressor = match self.compression {
            ZarrCompression::None => return Ok(Vec::new()),
            ZarrCompression::Lz4 | ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::Zstd | ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.compression_level)
            .map_err(|_| StoreError::Config("Invalid compression level".to_string()))?;

        // typesize is required when shuffle is enabled
        let (shuffle, typesize) = if self.shuffle {
            (BloscShuffleMode::Shuffle, Some(typesize))
        } else {
            (BloscShuffleMode::NoShuffle, None)
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| StoreError::Config(e.to_string()))?;

        Ok(vec![Arc::new(codec)])
    }
}

/// Compression codec for Zarr arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// LZ4 compression.
    Lz4,
    /// Zstd compression.
    Zstd,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd (recommended).
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Parse case-insensitively, falling back to Blosc/Zstd.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for ZarrCompression {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            "blosc_lz4" => Ok(Self::BloscLz4),
            "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(StoreError::Config(format!("unknown compression {other:?}"))),
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
