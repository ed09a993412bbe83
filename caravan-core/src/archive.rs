/*!
Zip-backed archive container.

The archive is a directory tree of named entries: UTF-8 JSON documents and
raw binary assets. Entries are buffered through memory and deflated; the
finished archive is handed to the caller as a byte vector ready for
download or writing to disk.
*/

use std::io::{Cursor, Read, Write};

use serde_json::Value;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::document::DocumentKind;
use crate::error::{CaravanError, Result};

/// Entry name of the archive manifest.
pub const MANIFEST_ENTRY: &str = "adventure.json";

/// Entry name of the folder listing.
pub const FOLDERS_ENTRY: &str = "folders.json";

/// Streaming writer for a new archive.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    fn options() -> FileOptions {
        FileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    /// Add a pretty-printed JSON entry.
    pub fn add_json(&mut self, name: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        self.zip.start_file(name, Self::options())?;
        self.zip.write_all(text.as_bytes())?;
        self.entries += 1;
        Ok(())
    }

    /// Add a raw binary entry.
    pub fn add_binary(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.zip.start_file(name, Self::options())?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Finalize the container and return its bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let cursor = self
            .zip
            .finish()
            .map_err(|e| CaravanError::packaging(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over a packed archive held in memory.
pub struct ArchiveReader {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl ArchiveReader {
    /// Open an archive from its bytes.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CaravanError::invalid_format(format!("not a readable archive: {e}")))?;
        Ok(Self { zip })
    }

    /// Whether the archive holds an entry with this exact name.
    pub fn contains(&self, name: &str) -> bool {
        self.zip.file_names().any(|n| n == name)
    }

    /// Read and parse a JSON entry.
    pub fn read_json(&mut self, name: &str) -> Result<Value> {
        let bytes = self.read_binary(name)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read a raw binary entry.
    pub fn read_binary(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.zip.by_name(name)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// All entry names, sorted for deterministic iteration.
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// Entry names sharing a directory prefix (trailing slash implied).
    pub fn entries_under(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .zip
            .file_names()
            .filter(|n| n.starts_with(&prefix))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// The packed documents, as `(kind, id)` pairs parsed from
    /// `<kind>/<id>.json` entries, in deterministic order.
    pub fn documents(&self) -> Vec<(DocumentKind, String)> {
        let mut docs: Vec<(DocumentKind, String)> = self
            .zip
            .file_names()
            .filter_map(|name| {
                let (dir, rest) = name.split_once('/')?;
                if rest.contains('/') {
                    return None; // binary entries live deeper
                }
                let id = rest.strip_suffix(".json")?;
                let kind = DocumentKind::from_dir_name(dir)?;
                Some((kind, id.to_string()))
            })
            .collect();
        docs.sort_by_key(|(kind, id)| (kind.dir_name(), id.clone()));
        docs
    }
}

/// Archive entry path for a document's JSON.
pub fn document_entry(kind: DocumentKind, id: &str) -> String {
    format!("{}/{}.json", kind.dir_name(), id)
}

/// Archive entry path for a binary asset.
pub fn binary_entry(kind: DocumentKind, subdir: &str, owner: &str, filename: &str) -> String {
    format!("{}/{}/{}/{}", kind.dir_name(), subdir, owner, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_then_read_round_trip() {
        let mut writer = ArchiveWriter::new();
        writer
            .add_json(MANIFEST_ENTRY, &json!({"id": "a1", "name": "Test"}))
            .unwrap();
        writer
            .add_binary("scene/images/s1/map.png", b"\x89PNGfake")
            .unwrap();
        writer
            .add_json(&document_entry(DocumentKind::Scene, "s1"), &json!({"name": "Cove"}))
            .unwrap();
        assert_eq!(writer.len(), 3);

        let bytes = writer.finish().unwrap();
        let mut reader = ArchiveReader::open(bytes).unwrap();

        assert!(reader.contains(MANIFEST_ENTRY));
        assert!(!reader.contains(FOLDERS_ENTRY));
        assert_eq!(
            reader.read_json(MANIFEST_ENTRY).unwrap()["name"],
            json!("Test")
        );
        assert_eq!(
            reader.read_binary("scene/images/s1/map.png").unwrap(),
            b"\x89PNGfake"
        );
    }

    #[test]
    fn documents_lists_only_document_entries() {
        let mut writer = ArchiveWriter::new();
        writer.add_json(MANIFEST_ENTRY, &json!({})).unwrap();
        writer.add_json(FOLDERS_ENTRY, &json!([])).unwrap();
        writer
            .add_json(&document_entry(DocumentKind::Actor, "a2"), &json!({}))
            .unwrap();
        writer
            .add_json(&document_entry(DocumentKind::Actor, "a1"), &json!({}))
            .unwrap();
        writer
            .add_binary("actor/images/a1/portrait.png", b"png")
            .unwrap();

        let reader = ArchiveReader::open(writer.finish().unwrap()).unwrap();
        assert_eq!(
            reader.documents(),
            vec![
                (DocumentKind::Actor, "a1".to_string()),
                (DocumentKind::Actor, "a2".to_string()),
            ]
        );
    }

    #[test]
    fn entries_under_prefix() {
        let mut writer = ArchiveWriter::new();
        writer.add_binary("actor/token/a1/gob-1.png", b"1").unwrap();
        writer.add_binary("actor/token/a1/gob-2.png", b"2").unwrap();
        writer.add_binary("actor/token/a2/orc.png", b"3").unwrap();

        let reader = ArchiveReader::open(writer.finish().unwrap()).unwrap();
        assert_eq!(
            reader.entries_under("actor/token/a1"),
            vec![
                "actor/token/a1/gob-1.png".to_string(),
                "actor/token/a1/gob-2.png".to_string(),
            ]
        );
    }

    #[test]
    fn open_rejects_garbage() {
        assert!(matches!(
            ArchiveReader::open(b"not a zip".to_vec()),
            Err(CaravanError::InvalidFormat(_))
        ));
    }

    #[test]
    fn missing_entry_is_an_error() {
        let mut writer = ArchiveWriter::new();
        writer.add_json(MANIFEST_ENTRY, &json!({})).unwrap();
        let mut reader = ArchiveReader::open(writer.finish().unwrap()).unwrap();
        assert!(reader.read_binary("absent.png").is_err());
    }
}
