/*!
Document kinds and their asset descriptor tables.

Every exportable content unit belongs to a closed set of kinds. Each kind
carries a static table describing where asset references live inside its
field tree; one generic relocation routine in the exporter/importer
interprets the table, so the traversal is data-driven rather than
reflective.
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CaravanError;

/// The closed set of document kinds a world can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Scene,
    Actor,
    Item,
    Journal,
    Table,
    Playlist,
    Compendium,
    Macro,
}

impl DocumentKind {
    /// All kinds, in the order they are presented for selection.
    pub const ALL: [DocumentKind; 8] = [
        DocumentKind::Scene,
        DocumentKind::Actor,
        DocumentKind::Item,
        DocumentKind::Journal,
        DocumentKind::Table,
        DocumentKind::Playlist,
        DocumentKind::Compendium,
        DocumentKind::Macro,
    ];

    /// Directory name used for this kind inside the archive and on disk.
    pub fn dir_name(&self) -> &'static str {
        match self {
            DocumentKind::Scene => "scene",
            DocumentKind::Actor => "actor",
            DocumentKind::Item => "item",
            DocumentKind::Journal => "journal",
            DocumentKind::Table => "table",
            DocumentKind::Playlist => "playlist",
            DocumentKind::Compendium => "compendium",
            DocumentKind::Macro => "macro",
        }
    }

    /// Reverse of [`dir_name`](Self::dir_name).
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.dir_name() == name)
    }

    /// The asset descriptor table for documents of this kind.
    ///
    /// Compendium packs have no top-level assets of their own; their entries
    /// are walked with [`compendium_entry_rules`].
    pub fn asset_rules(&self) -> &'static [AssetRule] {
        match self {
            DocumentKind::Scene => SCENE_RULES,
            DocumentKind::Actor => ACTOR_RULES,
            DocumentKind::Item => ITEM_RULES,
            DocumentKind::Journal => JOURNAL_RULES,
            DocumentKind::Table => TABLE_RULES,
            DocumentKind::Playlist => PLAYLIST_RULES,
            DocumentKind::Compendium => &[],
            DocumentKind::Macro => MACRO_RULES,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for DocumentKind {
    type Err = CaravanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_dir_name(s)
            .ok_or_else(|| CaravanError::validation(format!("unknown document kind '{s}'")))
    }
}

/// Where an asset reference lives inside a document's field tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetField {
    /// A single field at a dot-path, e.g. `img` or `token.img`.
    Direct(&'static [&'static str]),
    /// One field inside each element of an array, e.g. `tokens[].img`.
    PerElement {
        array: &'static str,
        field: &'static [&'static str],
    },
}

/// One entry of a kind's asset descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRule {
    pub field: AssetField,
    /// Archive subdirectory binaries for this field are packed under.
    pub subdir: &'static str,
    /// Per-element rules: key binaries by the element's own `_id` instead of
    /// the owning document's id.
    pub own_id: bool,
    /// Whether the field may hold a wildcard token reference.
    pub wildcard: bool,
}

impl AssetRule {
    const fn direct(path: &'static [&'static str], subdir: &'static str) -> Self {
        AssetRule {
            field: AssetField::Direct(path),
            subdir,
            own_id: false,
            wildcard: false,
        }
    }

    const fn each(
        array: &'static str,
        field: &'static [&'static str],
        subdir: &'static str,
        own_id: bool,
    ) -> Self {
        AssetRule {
            field: AssetField::PerElement { array, field },
            subdir,
            own_id,
            wildcard: false,
        }
    }

    const fn with_wildcard(mut self) -> Self {
        self.wildcard = true;
        self
    }
}

const SCENE_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
    AssetRule::direct(&["token", "img"], "token"),
    AssetRule::each("tokens", &["img"], "tokenimage", true),
    AssetRule::each("sounds", &["path"], "scenesound", true),
    AssetRule::each("notes", &["icon"], "scenenote", true),
    AssetRule::each("tiles", &["img"], "tileimage", true),
];

const ACTOR_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
    AssetRule::direct(&["token", "img"], "token").with_wildcard(),
    AssetRule::each("items", &["img"], "images", false),
];

const ITEM_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
];

const JOURNAL_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
];

const TABLE_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
    AssetRule::each("results", &["img"], "table", true),
];

const PLAYLIST_RULES: &[AssetRule] = &[AssetRule::each("sounds", &["path"], "sounds", true)];

const MACRO_RULES: &[AssetRule] = &[
    AssetRule::direct(&["img"], "images"),
    AssetRule::direct(&["thumb"], "thumb"),
];

/// Asset descriptor table applied to each entry of a compendium pack.
///
/// Entry binaries are all keyed by the entry's id, including images of
/// owned items nested inside the entry.
pub fn compendium_entry_rules() -> &'static [AssetRule] {
    const ENTRY_RULES: &[AssetRule] = &[
        AssetRule::direct(&["img"], "images"),
        AssetRule::direct(&["thumb"], "images"),
        AssetRule::direct(&["token", "img"], "images"),
        AssetRule::each("items", &["img"], "images", false),
    ];
    ENTRY_RULES
}

/// Borrow the value at a nested object path.
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    Some(current)
}

/// Borrow the string at a nested object path.
pub fn string_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(value, path).and_then(Value::as_str)
}

/// Replace the string at a nested object path. Returns false when any
/// intermediate object is missing.
pub fn set_string_at(value: &mut Value, path: &[&str], new: &str) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut current = value;
    for key in parents {
        match current.get_mut(*key) {
            Some(next) => current = next,
            None => return false,
        }
    }
    match current.as_object_mut() {
        Some(map) => {
            map.insert((*last).to_string(), Value::String(new.to_string()));
            true
        }
        None => false,
    }
}

/// Stamp `flags.importid` on a document or folder value, creating the
/// `flags` object when absent.
pub fn stamp_import_id(fields: &mut Value, id: &str) {
    if let Some(map) = fields.as_object_mut() {
        let flags = map
            .entry("flags")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(flags) = flags.as_object_mut() {
            flags.insert("importid".to_string(), Value::String(id.to_string()));
        }
    }
}

/// The `flags.importid` stamp, when present.
pub fn import_id(fields: &Value) -> Option<&str> {
    string_at(fields, &["flags", "importid"])
}
