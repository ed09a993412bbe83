/*!
Adventure import pipeline.

Reads a packed archive, recreates the folder tree (parents strictly before
children, remapped through a run-scoped translation table), recreates each
document with its assets restored to live storage, and remaps references to
previously created records. Per-document failures are logged and skipped;
a missing manifest aborts the whole import.
*/

use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::archive::{document_entry, ArchiveReader, FOLDERS_ENTRY, MANIFEST_ENTRY};
use crate::assets;
use crate::document::{
    compendium_entry_rules, set_string_at, stamp_import_id, string_at, AssetField, AssetRule,
    DocumentKind,
};
use crate::error::{CaravanError, Result};
use crate::manifest::{AdventureManifest, FolderFlags, FolderRecord};
use crate::progress::{ProgressCounter, ProgressSink};
use crate::storage::AssetStorage;
use crate::world::WorldSink;

/// Same attribute scan as the exporter; remote URLs filtered in code.
static RICH_TEXT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(src|href)="([^"]+)""#).expect("rich-text pattern"));

/// `@Kind[id]` document links embedded in rich text.
static DOCUMENT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z]+)\[([A-Za-z0-9]+)\]").expect("document-link pattern"));

/// Caller-supplied parameters for one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Identifier of the world assets are restored into; becomes part of
    /// every restored asset path.
    pub world_id: String,
}

impl ImportOptions {
    pub fn new<W: Into<String>>(world_id: W) -> Self {
        Self {
            world_id: world_id.into(),
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new("world")
    }
}

/// Statistics of a completed import run.
#[derive(Debug)]
pub struct ImportReport {
    pub manifest: AdventureManifest,
    pub folders_created: usize,
    pub folders_reused: usize,
    pub documents_created: usize,
    /// Documents that failed and were skipped.
    pub skipped: Vec<(DocumentKind, String)>,
    /// Distinct binaries restored to live storage.
    pub assets_restored: usize,
    /// Upload failures surfaced to the user; the run continues past them.
    pub upload_failures: Vec<String>,
}

/// Import-run-scoped translation state.
///
/// Populated incrementally as folders and documents are created; consulted
/// whenever a later record references an earlier one. Lives exactly one
/// import run.
struct ImportContext {
    /// Original folder id -> newly created live id.
    folders: HashMap<String, String>,
    /// (kind, original id) -> newly created live id.
    documents: HashMap<(DocumentKind, String), String>,
    /// Archive paths already restored this run.
    restored: HashSet<String>,
    /// Lazily created per-kind placeholder roots.
    placeholder_roots: HashMap<DocumentKind, String>,
}

impl ImportContext {
    fn new() -> Self {
        Self {
            folders: HashMap::new(),
            documents: HashMap::new(),
            restored: HashSet::new(),
            placeholder_roots: HashMap::new(),
        }
    }
}

/// The import pipeline.
pub struct Importer<'a> {
    storage: &'a dyn AssetStorage,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    pub fn new(storage: &'a dyn AssetStorage, options: ImportOptions) -> Self {
        Self { storage, options }
    }

    /// Import a packed archive into a live world.
    pub fn import<W: WorldSink>(
        &self,
        archive: Vec<u8>,
        world: &mut W,
        progress: &mut dyn ProgressSink,
    ) -> Result<ImportReport> {
        let mut reader = ArchiveReader::open(archive)?;
        if !reader.contains(MANIFEST_ENTRY) {
            return Err(CaravanError::ManifestMissing);
        }
        let manifest: AdventureManifest = serde_json::from_value(reader.read_json(MANIFEST_ENTRY)?)?;
        if !manifest.is_compatible() {
            return Err(CaravanError::invalid_format(format!(
                "unsupported archive schema version {}",
                manifest.version
            )));
        }
        info!(adventure = %manifest.name, "Importing adventure");

        let folders: Vec<FolderRecord> = if reader.contains(FOLDERS_ENTRY) {
            serde_json::from_value(reader.read_json(FOLDERS_ENTRY)?)?
        } else {
            Vec::new()
        };
        let documents = reader.documents();

        let mut ctx = ImportContext::new();
        let mut counter = ProgressCounter::new(folders.len() + documents.len(), progress);
        let mut report = ImportReport {
            manifest: manifest.clone(),
            folders_created: 0,
            folders_reused: 0,
            documents_created: 0,
            skipped: Vec::new(),
            assets_restored: 0,
            upload_failures: Vec::new(),
        };
        counter.announce("reading manifest");

        self.build_folder_tree(&manifest, &folders, world, &mut ctx, &mut counter, &mut report)?;

        for (kind, id) in &documents {
            match self.import_document(&manifest, &mut reader, *kind, id, world, &mut ctx, &mut report)
            {
                Ok(new_id) => {
                    ctx.documents.insert((*kind, id.clone()), new_id);
                    report.documents_created += 1;
                }
                Err(e) => {
                    error!(kind = %kind, id = %id, error = %e, "Skipping document that failed to import");
                    report.skipped.push((*kind, id.clone()));
                }
            }
            counter.advance(kind.dir_name());
        }

        report.assets_restored = ctx.restored.len();
        Ok(report)
    }

    /// Recreate the folder tree with an explicit breadth-first worklist:
    /// roots are seeded first and a folder's children are enqueued only
    /// after the folder itself is created and recorded, so parents always
    /// exist before children reference them.
    fn build_folder_tree<W: WorldSink>(
        &self,
        manifest: &AdventureManifest,
        records: &[FolderRecord],
        world: &mut W,
        ctx: &mut ImportContext,
        counter: &mut ProgressCounter<'_>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let known: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        for (idx, record) in records.iter().enumerate() {
            match record.parent.as_deref() {
                Some(parent) if known.contains(parent) => {
                    children.entry(parent).or_default().push(idx);
                }
                Some(parent) => {
                    warn!(folder = %record.id, parent = %parent, "Folder parent is absent from the archive, importing as a root");
                    queue.push_back(idx);
                }
                None => queue.push_back(idx),
            }
        }

        let mut processed = 0usize;
        while let Some(idx) = queue.pop_front() {
            let record = &records[idx];
            processed += 1;
            let import_id = record.import_id().to_string();

            let live_id = match world.find_folder(record.kind, &import_id) {
                Some(existing) => {
                    debug!(folder = %import_id, live = %existing, "Reusing previously imported folder");
                    report.folders_reused += 1;
                    existing
                }
                None => {
                    let mut create = record.clone();
                    create.parent = match record.parent.as_deref() {
                        Some(parent) => ctx.folders.get(parent).cloned(),
                        None if manifest.options.folders => {
                            Some(self.placeholder_root(manifest, record.kind, world, ctx, report)?)
                        }
                        None => None, // per-kind default root
                    };
                    create.flags.importid = Some(import_id.clone());
                    let id = world.create_folder(&create)?;
                    debug!(folder = %import_id, live = %id, "Created folder");
                    report.folders_created += 1;
                    id
                }
            };

            // Recorded before any child leaves the queue.
            ctx.folders.insert(import_id, live_id);
            if let Some(kids) = children.get(record.id.as_str()) {
                queue.extend(kids.iter().copied());
            }
            counter.advance("folders");
        }

        if processed < records.len() {
            warn!(
                processed,
                total = records.len(),
                "Some folders were unreachable through parent links and were not imported"
            );
        }
        Ok(())
    }

    /// The per-kind root folder documents land under when the archive asks
    /// for its folder tree to be preserved. Named after the adventure and
    /// stamped so repeated imports of the same archive reuse it.
    fn placeholder_root<W: WorldSink>(
        &self,
        manifest: &AdventureManifest,
        kind: DocumentKind,
        world: &mut W,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<String> {
        if let Some(id) = ctx.placeholder_roots.get(&kind) {
            return Ok(id.clone());
        }
        let import_id = format!("{}:{}", manifest.id, kind.dir_name());
        let live = match world.find_folder(kind, &import_id) {
            Some(existing) => {
                report.folders_reused += 1;
                existing
            }
            None => {
                let record = FolderRecord {
                    id: String::new(),
                    name: manifest.name.clone(),
                    kind,
                    parent: None,
                    depth: 1,
                    sorting: 0,
                    flags: FolderFlags {
                        importid: Some(import_id),
                    },
                };
                let id = world.create_folder(&record)?;
                report.folders_created += 1;
                id
            }
        };
        ctx.placeholder_roots.insert(kind, live.clone());
        Ok(live)
    }

    #[allow(clippy::too_many_arguments)]
    fn import_document<W: WorldSink>(
        &self,
        manifest: &AdventureManifest,
        reader: &mut ArchiveReader,
        kind: DocumentKind,
        id: &str,
        world: &mut W,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<String> {
        let mut fields = reader
            .read_json(&document_entry(kind, id))
            .map_err(|e| CaravanError::document_import(kind, id, e.to_string()))?;
        debug!(kind = %kind, id = %id, "Importing document");

        if kind == DocumentKind::Compendium {
            if let Some(entries) = fields.get_mut("items").and_then(Value::as_array_mut) {
                for entry in entries.iter_mut() {
                    for rule in compendium_entry_rules() {
                        self.restore_rule(manifest, reader, entry, rule, ctx, report)?;
                    }
                    self.remap_links(entry, ctx);
                }
            }
        } else {
            for rule in kind.asset_rules() {
                self.restore_rule(manifest, reader, &mut fields, rule, ctx, report)?;
            }
            if kind == DocumentKind::Journal {
                self.restore_rich_text(manifest, reader, &mut fields, ctx, report)?;
                self.remap_links(&mut fields, ctx);
            }
        }

        self.remap_folder(&mut fields, ctx);
        stamp_import_id(&mut fields, id);

        world
            .create_document(kind, fields)
            .map_err(|e| CaravanError::document_import(kind, id, e.to_string()))
    }

    fn restore_rule(
        &self,
        manifest: &AdventureManifest,
        reader: &mut ArchiveReader,
        fields: &mut Value,
        rule: &AssetRule,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<()> {
        match rule.field {
            AssetField::Direct(path) => {
                let Some(raw) = string_at(fields, path).map(str::to_string) else {
                    return Ok(());
                };
                if let Some(new) = self.restore_asset(manifest, reader, &raw, ctx, report)? {
                    set_string_at(fields, path, &new);
                }
            }
            AssetField::PerElement { array, field } => {
                let Some(elements) = fields.get_mut(array).and_then(Value::as_array_mut) else {
                    return Ok(());
                };
                for element in elements.iter_mut() {
                    if let Some(raw) = string_at(element, field).map(str::to_string) {
                        if let Some(new) = self.restore_asset(manifest, reader, &raw, ctx, report)? {
                            set_string_at(element, field, &new);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Restore one reference. Returns the replacement string, or `None`
    /// when the field should be left untouched.
    fn restore_asset(
        &self,
        manifest: &AdventureManifest,
        reader: &mut ArchiveReader,
        raw: &str,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<Option<String>> {
        if raw.is_empty() {
            return Ok(None);
        }
        // Sentinel-marked external reference: strip and return, no storage
        // access of any kind.
        if raw.starts_with(assets::EXTERNAL_SENTINEL) {
            return Ok(Some(
                raw.trim_start_matches(assets::EXTERNAL_SENTINEL).to_string(),
            ));
        }
        if assets::is_remote(raw) {
            return Ok(None);
        }

        let dir = assets::parent_dir(raw);
        let filename = assets::strip_query(assets::file_name(raw));
        let target_dir = self.live_dir(manifest, dir);

        if filename.contains(assets::EXTERNAL_SENTINEL) {
            // Wildcard pattern: restore every entry packed beside it and
            // keep the pattern for the host's runtime resolution.
            for entry in reader.entries_under(dir) {
                self.restore_one(manifest, reader, &entry, ctx, report)?;
            }
        } else {
            self.restore_one(manifest, reader, raw, ctx, report)?;
        }

        Ok(Some(format!("{target_dir}/{filename}")))
    }

    /// Upload one archive entry to live storage, at most once per run.
    fn restore_one(
        &self,
        manifest: &AdventureManifest,
        reader: &mut ArchiveReader,
        archive_path: &str,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<()> {
        if ctx.restored.contains(archive_path) {
            debug!(path = %archive_path, "Already restored this run");
            return Ok(());
        }
        let bytes = match reader.read_binary(archive_path) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!(path = %archive_path, "Asset entry not present in archive");
                return Ok(());
            }
        };

        let target_dir = self.live_dir(manifest, assets::parent_dir(archive_path));
        let filename = assets::strip_query(assets::file_name(archive_path));
        if let Err(e) = self.storage.create_directory(&target_dir) {
            debug!(dir = %target_dir, error = %e, "Directory creation failed, attempting upload anyway");
        }

        let outcome = caravan_retry::with_custom_backoff(
            "asset_upload",
            caravan_retry::local_storage_backoff_policy(),
            || self.storage.upload_file(&target_dir, filename, &bytes),
        );
        match outcome {
            Ok(()) => {
                debug!(path = %archive_path, target = %target_dir, "Restored asset");
                ctx.restored.insert(archive_path.to_string());
            }
            Err(e) => {
                // Surfaced to the user; the run continues.
                error!(path = %archive_path, error = %e, "Failed to restore asset");
                report.upload_failures.push(e.to_string());
            }
        }
        Ok(())
    }

    /// Deterministic live directory for a restored archive directory.
    fn live_dir(&self, manifest: &AdventureManifest, archive_dir: &str) -> String {
        format!(
            "worlds/{}/adventures/{}/{}",
            self.options.world_id,
            manifest.sanitized_name(),
            archive_dir
        )
    }

    /// Restore the `src`/`href` references inside journal rich text.
    fn restore_rich_text(
        &self,
        manifest: &AdventureManifest,
        reader: &mut ArchiveReader,
        fields: &mut Value,
        ctx: &mut ImportContext,
        report: &mut ImportReport,
    ) -> Result<()> {
        let Some(content) = fields.get("content").and_then(Value::as_str).map(str::to_string)
        else {
            return Ok(());
        };

        let mut rewritten = String::with_capacity(content.len());
        let mut last = 0;
        let mut changed = false;
        for caps in RICH_TEXT_REF.captures_iter(&content) {
            let (Some(whole), Some(attr), Some(value)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if assets::is_remote(value.as_str()) {
                continue;
            }
            let Some(new_path) = self.restore_asset(manifest, reader, value.as_str(), ctx, report)?
            else {
                continue;
            };
            rewritten.push_str(&content[last..whole.start()]);
            rewritten.push_str(attr.as_str());
            rewritten.push_str("=\"");
            rewritten.push_str(&new_path);
            rewritten.push('"');
            last = whole.end();
            changed = true;
        }
        if !changed {
            return Ok(());
        }
        rewritten.push_str(&content[last..]);
        if let Some(map) = fields.as_object_mut() {
            map.insert("content".to_string(), Value::String(rewritten));
        }
        Ok(())
    }

    /// Remap `@Kind[id]` links to documents created earlier in this run.
    /// Unknown targets are left unchanged.
    fn remap_links(&self, fields: &mut Value, ctx: &ImportContext) {
        let Some(content) = fields.get("content").and_then(Value::as_str) else {
            return;
        };
        let remapped = DOCUMENT_LINK.replace_all(content, |caps: &regex::Captures<'_>| {
            let kind_name = caps[1].to_ascii_lowercase();
            if let Some(kind) = DocumentKind::from_dir_name(&kind_name) {
                if let Some(new_id) = ctx.documents.get(&(kind, caps[2].to_string())) {
                    return format!("@{}[{}]", &caps[1], new_id);
                }
            }
            caps[0].to_string()
        });
        if let Cow::Owned(new_content) = remapped {
            if let Some(map) = fields.as_object_mut() {
                map.insert("content".to_string(), Value::String(new_content));
            }
        }
    }

    /// Remap a document's folder parent through the translation table.
    fn remap_folder(&self, fields: &mut Value, ctx: &ImportContext) {
        let Some(original) = fields.get("folder").and_then(Value::as_str).map(str::to_string)
        else {
            return;
        };
        let Some(map) = fields.as_object_mut() else {
            return;
        };
        match ctx.folders.get(&original) {
            Some(live) => {
                map.insert("folder".to_string(), Value::String(live.clone()));
            }
            None => {
                debug!(folder = %original, "Folder reference not in this archive, dropping");
                map.remove("folder");
            }
        }
    }
}
