/*!
Adventure export pipeline.

Walks the caller's selection of documents, relocates every embedded asset
reference into the archive (deduplicated through an export-run-scoped
cache), serializes the rewritten documents, appends the folder tree and
manifest, and packages everything into a single downloadable container.

A failure on one document never aborts the run; the document is logged and
skipped. Structural failures (folder listing, packaging) abort with nothing
delivered.
*/

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::archive::{binary_entry, document_entry, ArchiveWriter, FOLDERS_ENTRY, MANIFEST_ENTRY};
use crate::assets::{self, AssetClass};
use crate::document::{
    compendium_entry_rules, set_string_at, stamp_import_id, string_at, AssetField, AssetRule,
    DocumentKind,
};
use crate::error::{CaravanError, Result};
use crate::manifest::AdventureManifest;
use crate::progress::{ProgressCounter, ProgressSink};
use crate::storage::{AssetStorage, BrowseOptions};
use crate::world::WorldSource;

/// `src="..."` / `href="..."` attributes in journal rich text. Remote URLs
/// are filtered by the caller; the regex crate has no lookahead.
static RICH_TEXT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(src|href)="([^"]+)""#).expect("rich-text pattern"));

/// Caller-supplied parameters for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Human-readable adventure name; empty names get a generated title.
    pub name: String,
    pub description: String,
    /// Identifier of the game system the source world runs.
    pub system: String,
    /// Titles of the extensions active in the source world.
    pub modules: Vec<String>,
    /// Record that the folder tree should be preserved on import.
    pub preserve_folders: bool,
    /// Folders at this depth trigger a flattening warning.
    pub max_folder_depth: u8,
}

impl ExportOptions {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            system: "generic".to_string(),
            modules: Vec::new(),
            preserve_folders: false,
            max_folder_depth: 3,
        }
    }
}

/// Outcome of a completed export run.
#[derive(Debug)]
pub struct ExportOutput {
    /// The packed archive, ready to write or download.
    pub bytes: Vec<u8>,
    /// Suggested filename derived from the adventure name.
    pub filename: String,
    pub manifest: AdventureManifest,
    pub report: ExportReport,
}

/// Statistics of a completed export run.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub documents_exported: usize,
    /// Documents that failed and were skipped.
    pub skipped: Vec<(DocumentKind, String)>,
    /// Distinct binaries packed into the archive.
    pub assets_packed: usize,
    pub warnings: Vec<String>,
}

/// Export-run-scoped scratch state.
///
/// Created fresh for every run and discarded with it, so stale archive
/// paths never leak across runs.
struct ExportContext {
    /// Original asset reference -> assigned archive path.
    cache: HashMap<String, String>,
    assets_packed: usize,
}

impl ExportContext {
    fn new() -> Self {
        Self {
            cache: HashMap::new(),
            assets_packed: 0,
        }
    }
}

/// The export pipeline.
pub struct Exporter<'a> {
    storage: &'a dyn AssetStorage,
    options: ExportOptions,
}

impl<'a> Exporter<'a> {
    pub fn new(storage: &'a dyn AssetStorage, options: ExportOptions) -> Self {
        Self { storage, options }
    }

    /// Export the selected documents into a packed archive.
    pub fn export<W: WorldSource>(
        &self,
        world: &W,
        selection: &[(DocumentKind, String)],
        progress: &mut dyn ProgressSink,
    ) -> Result<ExportOutput> {
        let mut ctx = ExportContext::new();
        let mut writer = ArchiveWriter::new();
        let mut counter = ProgressCounter::new(selection.len(), progress);
        let mut report = ExportReport::default();
        counter.announce("collecting selection");

        for (kind, id) in selection {
            match self.export_document(world, *kind, id, &mut ctx, &mut writer, &mut counter) {
                Ok(()) => report.documents_exported += 1,
                Err(e) => {
                    error!(kind = %kind, id = %id, error = %e, "Skipping document that failed to export");
                    report.skipped.push((*kind, id.clone()));
                }
            }
            counter.advance(kind.dir_name());
        }

        self.export_folders(world, &mut writer, &mut counter, &mut report)?;

        let manifest = self.build_manifest();
        manifest.validate()?;
        counter.announce("adventure metadata");
        writer.add_json(MANIFEST_ENTRY, &serde_json::to_value(&manifest)?)?;

        info!(entries = writer.len(), "Packaging adventure archive");
        counter.announce("packaging archive");
        let bytes = writer.finish()?;

        report.assets_packed = ctx.assets_packed;
        Ok(ExportOutput {
            bytes,
            filename: manifest.archive_filename(),
            manifest,
            report,
        })
    }

    fn export_document<W: WorldSource>(
        &self,
        world: &W,
        kind: DocumentKind,
        id: &str,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
        counter: &mut ProgressCounter<'_>,
    ) -> Result<()> {
        let mut fields = world
            .document(kind, id)
            .map_err(|e| CaravanError::document_export(kind, id, e.to_string()))?;
        debug!(kind = %kind, id = %id, "Exporting document");

        // Access control is world-local and meaningless inside an archive.
        if let Some(map) = fields.as_object_mut() {
            map.remove("permission");
        }
        stamp_import_id(&mut fields, id);

        if kind == DocumentKind::Compendium {
            self.export_compendium_entries(&mut fields, ctx, writer, counter)?;
        } else {
            for rule in kind.asset_rules() {
                // The primary image rule runs first, so an unexpandable
                // wildcard token falls back to the relocated image path.
                let fallback = string_at(&fields, &["img"]).map(str::to_string);
                self.apply_rule(
                    kind,
                    id,
                    rule,
                    &mut fields,
                    fallback.as_deref(),
                    ctx,
                    writer,
                    counter,
                )?;
            }
            if kind == DocumentKind::Journal {
                self.rewrite_rich_text(kind, id, &mut fields, ctx, writer)?;
            }
        }

        writer
            .add_json(&document_entry(kind, id), &fields)
            .map_err(|e| CaravanError::document_export(kind, id, e.to_string()))
    }

    /// Compendium packs hold their entries inline; every entry's binaries
    /// are keyed by the entry's own id.
    fn export_compendium_entries(
        &self,
        fields: &mut Value,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
        counter: &mut ProgressCounter<'_>,
    ) -> Result<()> {
        let kind = DocumentKind::Compendium;
        let Some(entries) = fields.get_mut("items").and_then(Value::as_array_mut) else {
            return Ok(());
        };
        counter.grow(entries.len());
        for entry in entries.iter_mut() {
            let owner = entry
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or("entry")
                .to_string();
            let fallback = string_at(entry, &["img"]).map(str::to_string);
            for rule in compendium_entry_rules() {
                self.apply_rule(
                    kind,
                    &owner,
                    rule,
                    entry,
                    fallback.as_deref(),
                    ctx,
                    writer,
                    counter,
                )?;
            }
            counter.advance(kind.dir_name());
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_rule(
        &self,
        kind: DocumentKind,
        doc_id: &str,
        rule: &AssetRule,
        fields: &mut Value,
        fallback: Option<&str>,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
        counter: &mut ProgressCounter<'_>,
    ) -> Result<()> {
        match rule.field {
            AssetField::Direct(path) => {
                let Some(raw) = string_at(fields, path).map(str::to_string) else {
                    return Ok(());
                };
                if let Some(new) =
                    self.relocate(kind, doc_id, rule, &raw, fallback, ctx, writer, counter)?
                {
                    set_string_at(fields, path, &new);
                }
            }
            AssetField::PerElement { array, field } => {
                let Some(elements) = fields.get_mut(array).and_then(Value::as_array_mut) else {
                    return Ok(());
                };
                counter.grow(elements.len());
                for element in elements.iter_mut() {
                    let owner = if rule.own_id {
                        element
                            .get("_id")
                            .and_then(Value::as_str)
                            .unwrap_or(doc_id)
                            .to_string()
                    } else {
                        doc_id.to_string()
                    };
                    if let Some(raw) = string_at(element, field).map(str::to_string) {
                        if let Some(new) =
                            self.relocate(kind, &owner, rule, &raw, fallback, ctx, writer, counter)?
                        {
                            set_string_at(element, field, &new);
                        }
                    }
                    counter.advance(rule.subdir);
                }
            }
        }
        Ok(())
    }

    /// Relocate one reference. Returns the replacement string, or `None`
    /// when the field should be left untouched.
    #[allow(clippy::too_many_arguments)]
    fn relocate(
        &self,
        kind: DocumentKind,
        owner: &str,
        rule: &AssetRule,
        raw: &str,
        fallback: Option<&str>,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
        counter: &mut ProgressCounter<'_>,
    ) -> Result<Option<String>> {
        let Some(class) = assets::classify(raw) else {
            return Ok(None);
        };
        match class {
            AssetClass::External(bare) => Ok(Some(assets::mark_external(&bare))),
            AssetClass::Wildcard { dir, pattern } if rule.wildcard => {
                if assets::is_remote(&dir) {
                    // Wildcard enumeration over remote URLs is unsupported;
                    // the primary image beats no image at all.
                    debug!(reference = %raw, "Remote wildcard reference, substituting primary image");
                    return Ok(fallback.map(str::to_string));
                }
                let browse = BrowseOptions {
                    extensions: assets::pattern_extensions(&pattern),
                    wildcard: true,
                };
                let files = match self.storage.browse(&dir, &browse) {
                    Ok(result) => result.files,
                    Err(e) => {
                        debug!(reference = %raw, error = %e, "Wildcard browse failed, marking reference external");
                        return Ok(Some(assets::mark_external(raw)));
                    }
                };
                debug!(reference = %raw, count = files.len(), "Expanding wildcard token images");
                counter.grow(files.len());
                for file in &files {
                    self.pack_local(kind, owner, rule.subdir, file, ctx, writer)?;
                    counter.advance(rule.subdir);
                }
                Ok(Some(format!(
                    "{}/{}/{}/{}",
                    kind.dir_name(),
                    rule.subdir,
                    owner,
                    pattern
                )))
            }
            // Not a wildcard-capable field: an ordinary local read, which
            // degrades to an external marker when it fails.
            AssetClass::Wildcard { .. } | AssetClass::Local(_) => {
                Ok(Some(self.pack_local(kind, owner, rule.subdir, raw, ctx, writer)?))
            }
        }
    }

    /// Pack one local binary, deduplicated on the original reference.
    fn pack_local(
        &self,
        kind: DocumentKind,
        owner: &str,
        subdir: &str,
        reference: &str,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
    ) -> Result<String> {
        if let Some(cached) = ctx.cache.get(reference) {
            return Ok(cached.clone());
        }
        match self.storage.read_binary(reference) {
            Ok(bytes) => {
                let decoded = assets::percent_decode(reference);
                let filename = assets::file_name(&decoded);
                let entry = binary_entry(kind, subdir, owner, filename);
                writer.add_binary(&entry, &bytes)?;
                ctx.cache.insert(reference.to_string(), entry.clone());
                ctx.assets_packed += 1;
                Ok(entry)
            }
            Err(e) => {
                debug!(reference, error = %e, "Asset is outside managed storage or unreadable, leaving as external");
                Ok(assets::mark_external(reference))
            }
        }
    }

    /// Scan journal rich text for `src`/`href` references and relocate the
    /// local ones in place. Absolute remote URLs are left byte-for-byte.
    fn rewrite_rich_text(
        &self,
        kind: DocumentKind,
        id: &str,
        fields: &mut Value,
        ctx: &mut ExportContext,
        writer: &mut ArchiveWriter,
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
            let new_path = self.pack_local(kind, id, "images", value.as_str(), ctx, writer)?;
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

    fn export_folders<W: WorldSource>(
        &self,
        world: &W,
        writer: &mut ArchiveWriter,
        counter: &mut ProgressCounter<'_>,
        report: &mut ExportReport,
    ) -> Result<()> {
        let folders = world.folders()?;
        info!(count = folders.len(), "Exporting folders");
        counter.announce("folders");

        let deep = folders
            .iter()
            .filter(|f| f.depth >= self.options.max_folder_depth)
            .count();
        if deep > 0 {
            let warning = format!(
                "{deep} folder(s) sit at the maximum nesting depth ({}); enable folder \
                 preservation on import to keep the tree from flattening",
                self.options.max_folder_depth
            );
            warn!("{warning}");
            report.warnings.push(warning);
        }

        let mut records = Vec::with_capacity(folders.len());
        for mut record in folders {
            record.flags.importid = Some(record.id.clone());
            records.push(record);
        }
        writer.add_json(FOLDERS_ENTRY, &serde_json::to_value(&records)?)
    }

    fn build_manifest(&self) -> AdventureManifest {
        AdventureManifest::new(
            self.options.name.clone(),
            self.options.description.clone(),
            self.options.system.clone(),
        )
        .with_modules(self.options.modules.clone())
        .with_folders(self.options.preserve_folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveReader;
    use crate::document::import_id;
    use crate::manifest::{FolderFlags, FolderRecord};
    use crate::progress::test_support::RecordingProgress;
    use crate::progress::NullProgress;
    use crate::storage::MemoryStorage;
    use crate::world::MemoryWorld;
    use serde_json::json;

    fn scene_with_two_tokens() -> MemoryWorld {
        let mut world = MemoryWorld::new();
        world.insert_document(
            DocumentKind::Scene,
            "s1",
            json!({
                "name": "Goblin Cave",
                "img": "maps/cave.jpg",
                "permission": {"default": 2},
                "tokens": [
                    {"_id": "t1", "img": "tokens/goblin.png"},
                    {"_id": "t2", "img": "tokens/goblin.png"}
                ],
                "sounds": [],
                "notes": [],
                "tiles": []
            }),
        );
        world
    }

    fn export_scene(world: &MemoryWorld, storage: &MemoryStorage) -> ExportOutput {
        let exporter = Exporter::new(storage, ExportOptions::new("Test Adventure"));
        exporter
            .export(
                world,
                &[(DocumentKind::Scene, "s1".to_string())],
                &mut NullProgress,
            )
            .unwrap()
    }

    #[test]
    fn shared_token_image_is_packed_once() {
        let world = scene_with_two_tokens();
        let storage = MemoryStorage::new()
            .with_file("maps/cave.jpg", b"cave")
            .with_file("tokens/goblin.png", b"goblin");

        let output = export_scene(&world, &storage);
        assert_eq!(output.report.assets_packed, 2);

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("scene/s1.json").unwrap();

        // Both tokens point at the identical archive path...
        let first = doc["tokens"][0]["img"].as_str().unwrap();
        let second = doc["tokens"][1]["img"].as_str().unwrap();
        assert_eq!(first, "scene/tokenimage/t1/goblin.png");
        assert_eq!(first, second);

        // ...and the archive holds exactly one physical copy.
        assert_eq!(
            reader.entries_under("scene/tokenimage"),
            vec!["scene/tokenimage/t1/goblin.png".to_string()]
        );
    }

    #[test]
    fn external_references_are_sentinel_marked_once() {
        let mut world = MemoryWorld::new();
        world.insert_document(
            DocumentKind::Item,
            "i1",
            json!({
                "name": "Relic",
                "img": "https://example.com/relic.png",
                "thumb": "*icons/core/relic.png"
            }),
        );
        let storage = MemoryStorage::new();
        let exporter = Exporter::new(&storage, ExportOptions::new("x"));
        let output = exporter
            .export(
                &world,
                &[(DocumentKind::Item, "i1".to_string())],
                &mut NullProgress,
            )
            .unwrap();

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("item/i1.json").unwrap();
        assert_eq!(doc["img"], json!("*https://example.com/relic.png"));
        // Already-marked references are not double-marked.
        assert_eq!(doc["thumb"], json!("*icons/core/relic.png"));
        assert_eq!(output.report.assets_packed, 0);
    }

    #[test]
    fn unreadable_local_asset_degrades_to_external_marker() {
        let world = scene_with_two_tokens();
        let storage = MemoryStorage::new(); // nothing readable

        let output = export_scene(&world, &storage);
        assert_eq!(output.report.documents_exported, 1);
        assert_eq!(output.report.assets_packed, 0);

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("scene/s1.json").unwrap();
        assert_eq!(doc["img"], json!("*maps/cave.jpg"));
        assert_eq!(doc["tokens"][0]["img"], json!("*tokens/goblin.png"));
    }

    #[test]
    fn one_failing_document_does_not_abort_the_run() {
        let mut world = MemoryWorld::new();
        world.insert_document(DocumentKind::Item, "i1", json!({"name": "A", "img": ""}));
        world.insert_document(DocumentKind::Item, "i3", json!({"name": "C", "img": ""}));
        let storage = MemoryStorage::new();
        let exporter = Exporter::new(&storage, ExportOptions::new("partial"));

        let selection = vec![
            (DocumentKind::Item, "i1".to_string()),
            (DocumentKind::Item, "i2".to_string()), // does not exist
            (DocumentKind::Item, "i3".to_string()),
        ];
        let output = exporter.export(&world, &selection, &mut NullProgress).unwrap();

        assert_eq!(output.report.documents_exported, 2);
        assert_eq!(
            output.report.skipped,
            vec![(DocumentKind::Item, "i2".to_string())]
        );
        let reader = ArchiveReader::open(output.bytes).unwrap();
        assert_eq!(reader.documents().len(), 2);
    }

    #[test]
    fn journal_rich_text_is_rewritten_in_place() {
        let mut world = MemoryWorld::new();
        world.insert_document(
            DocumentKind::Journal,
            "j1",
            json!({
                "name": "Handout",
                "content": "<img src=\"assets/map.png\"> and <img src=\"https://example.com/x.png\"> \
                            plus <a href=\"assets/map.png\">map</a>"
            }),
        );
        let storage = MemoryStorage::new().with_file("assets/map.png", b"map");
        let exporter = Exporter::new(&storage, ExportOptions::new("j"));
        let output = exporter
            .export(
                &world,
                &[(DocumentKind::Journal, "j1".to_string())],
                &mut NullProgress,
            )
            .unwrap();

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("journal/j1.json").unwrap();
        let content = doc["content"].as_str().unwrap();
        assert!(content.contains("src=\"journal/images/j1/map.png\""));
        assert!(content.contains("href=\"journal/images/j1/map.png\""));
        // The remote URL is left byte-for-byte unchanged.
        assert!(content.contains("src=\"https://example.com/x.png\""));
        // Two references, one physical asset.
        assert_eq!(output.report.assets_packed, 1);
    }

    #[test]
    fn actor_wildcard_token_expands_local_directory() {
        let mut world = MemoryWorld::new();
        world.insert_document(
            DocumentKind::Actor,
            "a1",
            json!({
                "name": "Goblin",
                "img": "portraits/goblin.png",
                "token": {"img": "tokens/gobs/*.png", "randomImg": true}
            }),
        );
        let storage = MemoryStorage::new()
            .with_file("portraits/goblin.png", b"p")
            .with_file("tokens/gobs/g1.png", b"1")
            .with_file("tokens/gobs/g2.png", b"2")
            .with_file("tokens/gobs/readme.txt", b"x");

        let exporter = Exporter::new(&storage, ExportOptions::new("wild"));
        let output = exporter
            .export(
                &world,
                &[(DocumentKind::Actor, "a1".to_string())],
                &mut NullProgress,
            )
            .unwrap();

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("actor/a1.json").unwrap();
        // The pattern survives; the matched files are all packed beside it.
        assert_eq!(doc["token"]["img"], json!("actor/token/a1/*.png"));
        assert_eq!(
            reader.entries_under("actor/token/a1"),
            vec![
                "actor/token/a1/g1.png".to_string(),
                "actor/token/a1/g2.png".to_string(),
            ]
        );
    }

    #[test]
    fn remote_wildcard_falls_back_to_primary_image() {
        let mut world = MemoryWorld::new();
        world.insert_document(
            DocumentKind::Actor,
            "a1",
            json!({
                "name": "Goblin",
                "img": "portraits/goblin.png",
                "token": {"img": "https://cdn.example.com/gobs/*.png"}
            }),
        );
        let storage = MemoryStorage::new().with_file("portraits/goblin.png", b"p");
        let exporter = Exporter::new(&storage, ExportOptions::new("wild"));
        let output = exporter
            .export(
                &world,
                &[(DocumentKind::Actor, "a1".to_string())],
                &mut NullProgress,
            )
            .unwrap();

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let doc = reader.read_json("actor/a1.json").unwrap();
        assert_eq!(doc["token"]["img"], doc["img"]);
    }

    #[test]
    fn folders_are_stamped_and_deep_trees_warned() {
        let mut world = MemoryWorld::new();
        world.insert_folder(FolderRecord {
            id: "f1".to_string(),
            name: "Deep".to_string(),
            kind: DocumentKind::Scene,
            parent: Some("f0".to_string()),
            depth: 3,
            sorting: 0,
            flags: FolderFlags::default(),
        });
        let storage = MemoryStorage::new();
        let exporter = Exporter::new(&storage, ExportOptions::new("folders"));
        let output = exporter.export(&world, &[], &mut NullProgress).unwrap();

        assert_eq!(output.report.warnings.len(), 1);
        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let folders = reader.read_json(FOLDERS_ENTRY).unwrap();
        assert_eq!(folders[0]["flags"]["importid"], json!("f1"));
    }

    #[test]
    fn manifest_records_options_and_permission_is_stripped() {
        let world = scene_with_two_tokens();
        let storage = MemoryStorage::new();
        let options = ExportOptions {
            name: "The Lost Mine".to_string(),
            description: "intro".to_string(),
            system: "dnd5e".to_string(),
            modules: vec!["Adventure Kit".to_string()],
            preserve_folders: true,
            max_folder_depth: 3,
        };
        let exporter = Exporter::new(&storage, options);
        let output = exporter
            .export(
                &world,
                &[(DocumentKind::Scene, "s1".to_string())],
                &mut NullProgress,
            )
            .unwrap();

        assert!(output.manifest.options.folders);
        assert_eq!(output.filename, "The Lost Mine.fvttadv");

        let mut reader = ArchiveReader::open(output.bytes).unwrap();
        let manifest = reader.read_json(MANIFEST_ENTRY).unwrap();
        assert_eq!(manifest["system"], json!("dnd5e"));
        assert_eq!(manifest["options"]["folders"], json!(true));

        let doc = reader.read_json("scene/s1.json").unwrap();
        assert!(doc.get("permission").is_none());
        assert_eq!(import_id(&doc), Some("s1"));
    }

    #[test]
    fn progress_total_rises_with_nested_assets() {
        let world = scene_with_two_tokens();
        let storage = MemoryStorage::new()
            .with_file("maps/cave.jpg", b"cave")
            .with_file("tokens/goblin.png", b"goblin");

        let mut progress = RecordingProgress::default();
        let exporter = Exporter::new(&storage, ExportOptions::new("progress"));
        exporter
            .export(
                &world,
                &[(DocumentKind::Scene, "s1".to_string())],
                &mut progress,
            )
            .unwrap();

        let first_total = progress.updates.first().map(|u| u.1).unwrap_or(0);
        let last_total = progress.updates.last().map(|u| u.1).unwrap_or(0);
        assert!(last_total > first_total, "denominator should rise");
    }
}
