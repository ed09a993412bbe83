/*!
Asset storage adapters.

This module defines the storage abstraction (port) the pipelines consume
and its concrete implementations (adapters). The core never talks to a
filesystem or cloud API directly; everything flows through [`AssetStorage`],
so new backends slot in without touching the export/import logic.
*/

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{CaravanError, Result};

/// Filters for a storage directory listing.
#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    /// Restrict files to these extensions (with leading dot) when non-empty.
    pub extensions: Vec<String>,
    /// The listing backs a wildcard expansion.
    pub wildcard: bool,
}

/// Result of a storage directory listing.
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

/// Storage abstraction over the live asset backend.
///
/// Paths are forward-slash relative paths in the backend's namespace; the
/// same strings appear verbatim inside documents.
pub trait AssetStorage {
    /// List files and directories directly under `target`.
    fn browse(&self, target: &str, options: &BrowseOptions) -> Result<BrowseResult>;

    /// Ensure a directory (and its ancestors) exists. Idempotent.
    fn create_directory(&self, path: &str) -> Result<()>;

    /// Write a binary file under `dir`.
    fn upload_file(&self, dir: &str, filename: &str, data: &[u8]) -> Result<()>;

    /// Read a binary file.
    fn read_binary(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &str) -> bool;
}

/// Create the storage adapter described by a configuration.
pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn AssetStorage>> {
    config.validate()?;
    match config.backend {
        StorageBackend::Local => {
            let storage = match &config.local_base_path {
                Some(base) => local::LocalAssetStorage::with_base_dir(base),
                None => local::LocalAssetStorage::new(),
            };
            Ok(Box::new(storage))
        }
        StorageBackend::S3 => {
            #[cfg(feature = "s3")]
            {
                let bucket = config.s3_bucket.clone().ok_or_else(|| {
                    CaravanError::validation("S3 bucket name is required for the S3 backend")
                })?;
                Ok(Box::new(s3::S3AssetStorage::new(bucket)?))
            }
            #[cfg(not(feature = "s3"))]
            {
                Err(CaravanError::validation(
                    "S3 backend requested but the 's3' feature is not enabled",
                ))
            }
        }
    }
}

// Re-export types for convenience
pub use local::LocalAssetStorage;
#[cfg(feature = "s3")]
pub use s3::S3AssetStorage;

/// Memory-based storage adapter for testing
///
/// Stores files in a HashMap behind interior mutability so tests can drive
/// the `&self` trait methods without touching the filesystem. Uploads can
/// be counted and selectively rejected.
#[cfg(test)]
pub(crate) struct MemoryStorage {
    files: std::cell::RefCell<std::collections::HashMap<String, Vec<u8>>>,
    uploads: std::cell::Cell<usize>,
    rejected: std::collections::HashSet<String>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: Default::default(),
            uploads: std::cell::Cell::new(0),
            rejected: Default::default(),
        }
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.files
            .borrow_mut()
            .insert(path.to_string(), data.to_vec());
        self
    }

    /// Mark a filename so uploads of it are rejected permanently.
    pub fn rejecting(mut self, filename: &str) -> Self {
        self.rejected.insert(filename.to_string());
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.get()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
impl AssetStorage for MemoryStorage {
    fn browse(&self, target: &str, options: &BrowseOptions) -> Result<BrowseResult> {
        let prefix = format!("{}/", target.trim_end_matches('/'));
        let mut result = BrowseResult::default();
        for path in self.files.borrow().keys() {
            if let Some(rest) = path.strip_prefix(&prefix) {
                if rest.contains('/') {
                    continue;
                }
                if !options.extensions.is_empty()
                    && !options.extensions.iter().any(|ext| rest.ends_with(ext))
                {
                    continue;
                }
                result.files.push(path.clone());
            }
        }
        result.files.sort();
        Ok(result)
    }

    fn create_directory(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn upload_file(&self, dir: &str, filename: &str, data: &[u8]) -> Result<()> {
        if self.rejected.contains(filename) {
            return Err(CaravanError::UploadRejected {
                path: format!("{dir}/{filename}"),
                reason: "rejected by test storage".to_string(),
            });
        }
        self.uploads.set(self.uploads.get() + 1);
        self.files
            .borrow_mut()
            .insert(format!("{dir}/{filename}"), data.to_vec());
        Ok(())
    }

    fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| CaravanError::asset_unavailable(path, "not present in test storage"))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }
}
