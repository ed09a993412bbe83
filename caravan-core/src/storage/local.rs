/*!
Local filesystem storage adapter implementation.
*/

use std::fs;
use std::path::{Path, PathBuf};

use super::{AssetStorage, BrowseOptions, BrowseResult};
use crate::error::{CaravanError, Result};

/// Local managed-storage adapter.
///
/// Paths handed to the trait methods are forward-slash relative paths; they
/// are resolved against an optional base directory, and parent directories
/// are created on demand for writes.
#[derive(Debug, Clone)]
pub struct LocalAssetStorage {
    /// Optional base directory for all assets
    base_dir: Option<PathBuf>,
}

impl LocalAssetStorage {
    /// Create an adapter without a base directory; paths are used as-is.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Create an adapter resolving every path against `base_dir`.
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    /// Resolve the full filesystem path for a storage path.
    fn resolve_path(&self, path: &str) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl Default for LocalAssetStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStorage for LocalAssetStorage {
    fn browse(&self, target: &str, options: &BrowseOptions) -> Result<BrowseResult> {
        let full_dir = self.resolve_path(target);
        let entries = fs::read_dir(&full_dir).map_err(|e| {
            CaravanError::storage(format!("Failed to browse {}: {}", full_dir.display(), e))
        })?;

        let base = target.trim_end_matches('/');
        let mut result = BrowseResult::default();
        for entry in entries {
            let entry = entry.map_err(|e| {
                CaravanError::storage(format!("Failed to browse {}: {}", full_dir.display(), e))
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            let listed = if base.is_empty() {
                name.clone()
            } else {
                format!("{base}/{name}")
            };
            if entry.path().is_dir() {
                result.dirs.push(listed);
            } else {
                if !options.extensions.is_empty()
                    && !options.extensions.iter().any(|ext| name.ends_with(ext))
                {
                    continue;
                }
                result.files.push(listed);
            }
        }
        result.files.sort();
        result.dirs.sort();
        Ok(result)
    }

    fn create_directory(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| {
            CaravanError::storage(format!(
                "Failed to create directory {}: {}",
                full_path.display(),
                e
            ))
        })
    }

    fn upload_file(&self, dir: &str, filename: &str, data: &[u8]) -> Result<()> {
        let full_dir = self.resolve_path(dir);
        if !full_dir.exists() {
            fs::create_dir_all(&full_dir).map_err(|e| {
                CaravanError::storage(format!(
                    "Failed to create directory {}: {}",
                    full_dir.display(),
                    e
                ))
            })?;
        }

        let full_path = full_dir.join(filename);
        fs::write(&full_path, data).map_err(|e| CaravanError::UploadRejected {
            path: format!("{dir}/{filename}"),
            reason: e.to_string(),
        })
    }

    fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve_path(path);
        fs::read(&full_path).map_err(|e| CaravanError::asset_unavailable(path, e.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn upload_read_exists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalAssetStorage::with_base_dir(temp_dir.path());

        storage
            .upload_file("worlds/w1/adventures/test", "map.png", b"png-bytes")
            .unwrap();
        assert!(storage.exists("worlds/w1/adventures/test/map.png"));
        assert_eq!(
            storage
                .read_binary("worlds/w1/adventures/test/map.png")
                .unwrap(),
            b"png-bytes"
        );
    }

    #[test]
    fn read_missing_asset_degrades() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalAssetStorage::with_base_dir(temp_dir.path());
        assert!(matches!(
            storage.read_binary("tokens/missing.png"),
            Err(CaravanError::AssetUnavailable { .. })
        ));
    }

    #[test]
    fn browse_filters_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalAssetStorage::with_base_dir(temp_dir.path());
        storage.upload_file("tokens", "goblin-1.png", b"1").unwrap();
        storage.upload_file("tokens", "goblin-2.png", b"2").unwrap();
        storage.upload_file("tokens", "notes.txt", b"3").unwrap();
        storage.create_directory("tokens/sub").unwrap();

        let all = storage.browse("tokens", &BrowseOptions::default()).unwrap();
        assert_eq!(all.files.len(), 3);
        assert_eq!(all.dirs, vec!["tokens/sub".to_string()]);

        let pngs = storage
            .browse(
                "tokens",
                &BrowseOptions {
                    extensions: vec![".png".to_string()],
                    wildcard: true,
                },
            )
            .unwrap();
        assert_eq!(
            pngs.files,
            vec!["tokens/goblin-1.png".to_string(), "tokens/goblin-2.png".to_string()]
        );
    }

    #[test]
    fn create_directory_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalAssetStorage::with_base_dir(temp_dir.path());
        storage.create_directory("worlds/w1/adventures/a/b").unwrap();
        storage.create_directory("worlds/w1/adventures/a/b").unwrap();
        assert!(temp_dir.path().join("worlds/w1/adventures/a/b").is_dir());
    }
}
