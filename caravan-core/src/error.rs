/*!
Error types for the caravan core engine.
*/

use thiserror::Error;

use crate::document::DocumentKind;

/// Result type used throughout the caravan core.
pub type Result<T> = std::result::Result<T, CaravanError>;

/// Errors that can occur during archive export and import operations.
///
/// Per-item failures (`AssetUnavailable`, `DocumentExport`, `DocumentImport`,
/// `UploadTooLarge`, `UploadRejected`) never abort a run; structural failures
/// (`ManifestMissing`, `Packaging`) abort the whole operation.
#[derive(Error, Debug)]
pub enum CaravanError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip container errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive lacks its required adventure.json manifest
    #[error("Archive is missing its adventure.json manifest")]
    ManifestMissing,

    /// Invalid archive format
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    /// A local asset could not be read during export
    #[error("Asset '{path}' is unavailable: {reason}")]
    AssetUnavailable { path: String, reason: String },

    /// One document failed to export
    #[error("Failed to export {kind} {id}: {reason}")]
    DocumentExport {
        kind: DocumentKind,
        id: String,
        reason: String,
    },

    /// One document failed to import
    #[error("Failed to import {kind} {id}: {reason}")]
    DocumentImport {
        kind: DocumentKind,
        id: String,
        reason: String,
    },

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// The storage backend rejected a write for exceeding its size limit
    #[error("Upload of '{path}' exceeds the storage size limit")]
    UploadTooLarge { path: String },

    /// The storage backend rejected a write
    #[error("Storage rejected upload of '{path}': {reason}")]
    UploadRejected { path: String, reason: String },

    /// Final container generation failed
    #[error("Failed to package archive: {0}")]
    Packaging(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl CaravanError {
    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new packaging error
    pub fn packaging<S: Into<String>>(msg: S) -> Self {
        Self::Packaging(msg.into())
    }

    /// Create a new asset-unavailable error
    pub fn asset_unavailable<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::AssetUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new per-document export error
    pub fn document_export<I: Into<String>, R: Into<String>>(
        kind: DocumentKind,
        id: I,
        reason: R,
    ) -> Self {
        Self::DocumentExport {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a new per-document import error
    pub fn document_import<I: Into<String>, R: Into<String>>(
        kind: DocumentKind,
        id: I,
        reason: R,
    ) -> Self {
        Self::DocumentImport {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl caravan_retry::RetryableError for CaravanError {
    /// Generic storage and I/O failures are worth retrying; rejections,
    /// size-limit refusals and format problems are not.
    fn is_transient(&self) -> bool {
        matches!(self, CaravanError::Storage(_) | CaravanError::Io(_))
    }
}
