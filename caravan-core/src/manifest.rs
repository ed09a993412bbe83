/*!
Archive manifest and folder listing schemas.

The manifest (`adventure.json`) identifies the archive and records the
export options; the folder listing (`folders.json`) carries the source
world's folder tree, each record stamped with an import identifier so a
later import can recognize folders it has already created.
*/

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentKind;
use crate::error::{CaravanError, Result};

/// Current archive schema version for compatibility tracking.
pub const SCHEMA_VERSION: u32 = 1;

/// Export options recorded in the manifest.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifestOptions {
    /// Whether the folder tree should be preserved on import. A manifest
    /// lacking this flag imports with per-kind default roots.
    #[serde(default)]
    pub folders: bool,
}

/// The archive manifest persisted as `adventure.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdventureManifest {
    /// Generated identifier for this archive
    pub id: String,

    /// Human-readable adventure name
    pub name: String,

    /// Optional human-readable description
    #[serde(default)]
    pub description: String,

    /// Identifier of the game system the source world runs
    pub system: String,

    /// Titles of the extensions active in the source world
    #[serde(default)]
    pub modules: Vec<String>,

    /// Archive schema version (current: 1)
    pub version: u32,

    #[serde(default)]
    pub options: ManifestOptions,
}

impl AdventureManifest {
    /// Create a new manifest with a freshly generated archive identifier.
    ///
    /// An empty name falls back to `Adventure <unix-millis>`.
    pub fn new<N, D, S>(name: N, description: D, system: S) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        S: Into<String>,
    {
        let name = name.into();
        let name = if name.trim().is_empty() {
            format!("Adventure {}", Utc::now().timestamp_millis())
        } else {
            name
        };
        Self {
            id: generate_id(),
            name,
            description: description.into(),
            system: system.into(),
            modules: Vec::new(),
            version: SCHEMA_VERSION,
            options: ManifestOptions::default(),
        }
    }

    /// Record the active-extension snapshot.
    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = modules;
        self
    }

    /// Record whether the folder tree should be preserved on import.
    pub fn with_folders(mut self, folders: bool) -> Self {
        self.options.folders = folders;
        self
    }

    /// Validate that all required fields are properly set.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CaravanError::validation("manifest id cannot be empty"));
        }
        if self.name.is_empty() {
            return Err(CaravanError::validation("manifest name cannot be empty"));
        }
        if self.system.is_empty() {
            return Err(CaravanError::validation("manifest system cannot be empty"));
        }
        Ok(())
    }

    /// Check whether this manifest's schema version is readable by the
    /// current implementation.
    pub fn is_compatible(&self) -> bool {
        self.version <= SCHEMA_VERSION
    }

    /// Suggested filename for the packed archive.
    pub fn archive_filename(&self) -> String {
        format!("{}.fvttadv", sanitize_filename(&self.name))
    }

    /// The adventure name reduced to a storage-safe directory segment,
    /// used in restored asset paths.
    pub fn sanitized_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if cleaned.chars().all(|c| c == '_') {
            "adventure".to_string()
        } else {
            cleaned
        }
    }
}

/// Extra flags carried on a folder record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderFlags {
    /// Original id of the folder in its source world, stamped at export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importid: Option<String>,
}

/// One node of the world's folder tree as persisted in `folders.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FolderRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Folders are typed; they hold documents of exactly one kind.
    #[serde(rename = "type")]
    pub kind: DocumentKind,

    #[serde(default)]
    pub parent: Option<String>,

    /// Nesting depth in the source world (roots are depth 1).
    #[serde(default)]
    pub depth: u8,

    #[serde(default)]
    pub sorting: i64,

    #[serde(default)]
    pub flags: FolderFlags,
}

impl FolderRecord {
    /// The identifier imports key their translation table on: the stamped
    /// importid when present, else the record's own id.
    pub fn import_id(&self) -> &str {
        self.flags.importid.as_deref().unwrap_or(&self.id)
    }
}

/// Generate an identifier for archives, folders and documents.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Reduce a user-supplied name to a safe filename.
///
/// Strips path separators and shell-hostile punctuation, control
/// characters, and trailing dots/spaces; rejects Windows reserved device
/// names. An empty result falls back to `adventure`.
pub fn sanitize_filename(input: &str) -> String {
    const RESERVED: &[&str] = &[
        "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
        "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
    ];

    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, '/' | '\\' | '?' | '<' | '>' | ':' | '*' | '|' | '"'))
        .collect();
    let cleaned = cleaned.trim_end_matches(['.', ' ']).to_string();

    let stem = cleaned
        .split('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if cleaned.is_empty() || RESERVED.contains(&stem.as_str()) {
        "adventure".to_string()
    } else {
        cleaned
    }
}
