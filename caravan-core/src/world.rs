/*!
World content sources and sinks.

The pipelines never own the host's collections; they consume them through
two capability traits. [`WorldSource`] is the read side the exporter walks;
[`WorldSink`] is the write side the importer creates folders and documents
through. `FsWorld` implements both over a plain directory of JSON files;
`MemoryWorld` backs tests and embedding hosts.
*/

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::document::DocumentKind;
use crate::error::{CaravanError, Result};
use crate::manifest::{generate_id, FolderRecord};

/// Read-only enumeration of a world's documents and folders.
pub trait WorldSource {
    /// Fetch one document's field tree.
    fn document(&self, kind: DocumentKind, id: &str) -> Result<Value>;

    /// List the ids of all documents of a kind.
    fn list(&self, kind: DocumentKind) -> Result<Vec<String>>;

    /// The world's folder records.
    fn folders(&self) -> Result<Vec<FolderRecord>>;
}

/// Write side of a live world.
pub trait WorldSink {
    /// Find an existing folder whose live id or stamped importid matches,
    /// with the same kind.
    fn find_folder(&self, kind: DocumentKind, import_id: &str) -> Option<String>;

    /// Create a folder from a record (the record's id is advisory; the new
    /// live id is returned).
    fn create_folder(&mut self, record: &FolderRecord) -> Result<String>;

    /// Create a document and return its new live id.
    fn create_document(&mut self, kind: DocumentKind, fields: Value) -> Result<String>;
}

/// In-memory world for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    documents: HashMap<(DocumentKind, String), Value>,
    folders: Vec<FolderRecord>,
    created: Vec<(DocumentKind, String)>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (export-side test setup).
    pub fn insert_document<I: Into<String>>(&mut self, kind: DocumentKind, id: I, fields: Value) {
        self.documents.insert((kind, id.into()), fields);
    }

    /// Seed a folder record.
    pub fn insert_folder(&mut self, record: FolderRecord) {
        self.folders.push(record);
    }

    /// Documents created through the sink, in creation order.
    pub fn created_documents(&self) -> &[(DocumentKind, String)] {
        &self.created
    }

    /// All folder records currently in the world.
    pub fn folder_records(&self) -> &[FolderRecord] {
        &self.folders
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }
}

impl WorldSource for MemoryWorld {
    fn document(&self, kind: DocumentKind, id: &str) -> Result<Value> {
        self.documents
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| CaravanError::storage(format!("no such {kind} document: {id}")))
    }

    fn list(&self, kind: DocumentKind) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .documents
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn folders(&self) -> Result<Vec<FolderRecord>> {
        Ok(self.folders.clone())
    }
}

impl WorldSink for MemoryWorld {
    fn find_folder(&self, kind: DocumentKind, import_id: &str) -> Option<String> {
        self.folders
            .iter()
            .find(|f| {
                f.kind == kind
                    && (f.id == import_id || f.flags.importid.as_deref() == Some(import_id))
            })
            .map(|f| f.id.clone())
    }

    fn create_folder(&mut self, record: &FolderRecord) -> Result<String> {
        let mut created = record.clone();
        created.id = generate_id();
        let id = created.id.clone();
        self.folders.push(created);
        Ok(id)
    }

    fn create_document(&mut self, kind: DocumentKind, mut fields: Value) -> Result<String> {
        let id = generate_id();
        if let Some(map) = fields.as_object_mut() {
            map.insert("_id".to_string(), Value::String(id.clone()));
        }
        self.documents.insert((kind, id.clone()), fields);
        self.created.push((kind, id.clone()));
        Ok(id)
    }
}

/// Directory-backed world.
///
/// Layout: one subdirectory per document kind holding `<id>.json` files,
/// plus a `folders.json` listing at the root.
#[derive(Debug, Clone)]
pub struct FsWorld {
    root: PathBuf,
}

impl FsWorld {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, kind: DocumentKind, id: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{id}.json"))
    }

    fn folders_path(&self) -> PathBuf {
        self.root.join("folders.json")
    }

    fn load_folders(&self) -> Result<Vec<FolderRecord>> {
        let path = self.folders_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn store_folders(&self, folders: &[FolderRecord]) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let text = serde_json::to_string_pretty(folders)?;
        fs::write(self.folders_path(), text)?;
        Ok(())
    }
}

impl WorldSource for FsWorld {
    fn document(&self, kind: DocumentKind, id: &str) -> Result<Value> {
        let path = self.document_path(kind, id);
        let text = fs::read_to_string(&path).map_err(|e| {
            CaravanError::storage(format!("no such {kind} document at {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn list(&self, kind: DocumentKind) -> Result<Vec<String>> {
        let dir = self.root.join(kind.dir_name());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn folders(&self) -> Result<Vec<FolderRecord>> {
        self.load_folders()
    }
}

impl WorldSink for FsWorld {
    fn find_folder(&self, kind: DocumentKind, import_id: &str) -> Option<String> {
        self.load_folders().ok()?.iter().find_map(|f| {
            let matches = f.kind == kind
                && (f.id == import_id || f.flags.importid.as_deref() == Some(import_id));
            matches.then(|| f.id.clone())
        })
    }

    fn create_folder(&mut self, record: &FolderRecord) -> Result<String> {
        let mut folders = self.load_folders()?;
        let mut created = record.clone();
        created.id = generate_id();
        let id = created.id.clone();
        folders.push(created);
        self.store_folders(&folders)?;
        Ok(id)
    }

    fn create_document(&mut self, kind: DocumentKind, mut fields: Value) -> Result<String> {
        let id = generate_id();
        if let Some(map) = fields.as_object_mut() {
            map.insert("_id".to_string(), Value::String(id.clone()));
        }
        let path = self.document_path(kind, &id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&fields)?)?;
        Ok(id)
    }
}
