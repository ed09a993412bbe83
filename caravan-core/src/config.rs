//! Configuration for storage backend selection
//!
//! The live asset backend is chosen by environment detection: a configured
//! S3 bucket selects the cloud adapter, otherwise assets live on the local
//! filesystem (optionally under a base directory).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CaravanError, Result};

/// Environment variable naming the S3 bucket of the cloud asset backend.
pub const ENV_S3_BUCKET: &str = "CARAVAN_S3_BUCKET";

/// Environment variable naming the base directory of local asset storage.
pub const ENV_DATA_DIR: &str = "CARAVAN_DATA_DIR";

/// Enumeration of supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Local filesystem storage
    Local,
    /// Amazon S3 cloud storage
    S3,
}

/// Configuration structure for storage backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The storage backend to use
    pub backend: StorageBackend,
    /// Base path for local storage (optional, defaults to current directory)
    pub local_base_path: Option<PathBuf>,
    /// S3 bucket name (required for the S3 backend)
    pub s3_bucket: Option<String>,
}

impl StorageConfig {
    /// Create a default configuration for local filesystem storage
    pub fn default_local() -> Self {
        StorageConfig {
            backend: StorageBackend::Local,
            local_base_path: None,
            s3_bucket: None,
        }
    }

    /// Create a local configuration rooted at a base directory
    pub fn local_with_base<P: Into<PathBuf>>(base: P) -> Self {
        StorageConfig {
            backend: StorageBackend::Local,
            local_base_path: Some(base.into()),
            s3_bucket: None,
        }
    }

    /// Create an S3 configuration with the specified bucket
    pub fn s3_with_bucket(bucket: String) -> Self {
        StorageConfig {
            backend: StorageBackend::S3,
            local_base_path: None,
            s3_bucket: Some(bucket),
        }
    }

    /// Detect the backend from the environment.
    ///
    /// `CARAVAN_S3_BUCKET` selects the cloud backend; otherwise local
    /// storage is used, rooted at `CARAVAN_DATA_DIR` when set.
    pub fn from_env() -> Self {
        if let Ok(bucket) = std::env::var(ENV_S3_BUCKET) {
            if !bucket.is_empty() {
                return Self::s3_with_bucket(bucket);
            }
        }
        match std::env::var(ENV_DATA_DIR) {
            Ok(dir) if !dir.is_empty() => Self::local_with_base(dir),
            _ => Self::default_local(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            StorageBackend::S3 => {
                if self.s3_bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(CaravanError::validation(
                        "S3 backend requires a valid bucket name",
                    ));
                }
            }
            StorageBackend::Local => {}
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::default_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_local() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, StorageBackend::Local);
        assert!(config.local_base_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn local_with_base_keeps_path() {
        let config = StorageConfig::local_with_base("/srv/worlds");
        assert_eq!(config.local_base_path, Some(PathBuf::from("/srv/worlds")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn s3_requires_bucket() {
        let config = StorageConfig::s3_with_bucket("adventures".to_string());
        assert!(config.validate().is_ok());

        let config = StorageConfig {
            backend: StorageBackend::S3,
            local_base_path: None,
            s3_bucket: None,
        };
        assert!(config.validate().is_err());

        let config = StorageConfig {
            backend: StorageBackend::S3,
            local_base_path: None,
            s3_bucket: Some(String::new()),
        };
        assert!(config.validate().is_err());
    }
}
