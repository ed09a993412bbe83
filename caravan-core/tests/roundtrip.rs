/*!
End-to-end round-trip tests: export a directory-backed world into an
archive, then restore the archive into a second world over real local
storage.
*/

use caravan_core::{
    ArchiveReader, AssetStorage, DocumentKind, ExportOptions, Exporter, FsWorld, ImportOptions,
    Importer, LocalAssetStorage, NullProgress, WorldSource,
};
use serde_json::json;
use tempfile::TempDir;

struct Fixture {
    _data: TempDir,
    _worlds: TempDir,
    storage: LocalAssetStorage,
    source: FsWorld,
    target: FsWorld,
}

fn write_json(root: &std::path::Path, rel: &str, value: serde_json::Value) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn fixture() -> Fixture {
    let data = TempDir::new().unwrap();
    let worlds = TempDir::new().unwrap();
    let storage = LocalAssetStorage::with_base_dir(data.path());

    // Live binaries the source world references.
    storage.upload_file("maps", "cave.jpg", b"cave-image").unwrap();
    storage
        .upload_file("tokens", "goblin.png", b"goblin-token")
        .unwrap();
    storage
        .upload_file("assets", "handout.png", b"handout-image")
        .unwrap();

    let source_root = worlds.path().join("source");
    write_json(
        &source_root,
        "scene/s1.json",
        json!({
            "name": "Goblin Cave",
            "img": "maps/cave.jpg",
            "folder": "scene-child",
            "permission": {"default": 0},
            "tokens": [
                {"_id": "t1", "img": "tokens/goblin.png"},
                {"_id": "t2", "img": "tokens/goblin.png"}
            ],
            "sounds": [],
            "notes": [],
            "tiles": []
        }),
    );
    write_json(
        &source_root,
        "journal/j1.json",
        json!({
            "name": "Handout",
            "content": "<img src=\"assets/handout.png\"> keep <img src=\"https://example.com/x.png\">"
        }),
    );
    write_json(
        &source_root,
        "item/i1.json",
        json!({"name": "Relic", "img": "https://example.com/relic.png"}),
    );
    write_json(
        &source_root,
        "folders.json",
        json!([
            {"_id": "scene-child", "name": "Caves", "type": "scene", "parent": "scene-root", "depth": 2, "sorting": 0, "flags": {}},
            {"_id": "scene-root", "name": "Chapter 1", "type": "scene", "parent": null, "depth": 1, "sorting": 0, "flags": {}}
        ]),
    );

    let source = FsWorld::new(&source_root);
    let target = FsWorld::new(worlds.path().join("target"));
    Fixture {
        _data: data,
        _worlds: worlds,
        storage,
        source,
        target,
    }
}

fn full_selection(world: &FsWorld) -> Vec<(DocumentKind, String)> {
    let mut selection = Vec::new();
    for kind in DocumentKind::ALL {
        for id in world.list(kind).unwrap() {
            selection.push((kind, id));
        }
    }
    selection
}

#[test]
fn export_import_round_trip() {
    let mut fx = fixture();

    let options = ExportOptions {
        name: "Roundtrip Adventure".to_string(),
        description: "two scenes and change".to_string(),
        system: "dnd5e".to_string(),
        modules: vec!["Adventure Kit".to_string()],
        preserve_folders: true,
        max_folder_depth: 3,
    };
    let exporter = Exporter::new(&fx.storage, options);
    let selection = full_selection(&fx.source);
    let output = exporter
        .export(&fx.source, &selection, &mut NullProgress)
        .unwrap();

    assert_eq!(output.filename, "Roundtrip Adventure.fvttadv");
    assert_eq!(output.report.documents_exported, 3);
    assert!(output.report.skipped.is_empty());
    // cave.jpg + goblin.png (once, despite two tokens) + handout.png
    assert_eq!(output.report.assets_packed, 3);

    {
        let reader = ArchiveReader::open(output.bytes.clone()).unwrap();
        assert_eq!(
            reader.entries_under("scene/tokenimage"),
            vec!["scene/tokenimage/t1/goblin.png".to_string()]
        );
    }

    let importer = Importer::new(&fx.storage, ImportOptions::new("w2"));
    let report = importer
        .import(output.bytes.clone(), &mut fx.target, &mut NullProgress)
        .unwrap();

    assert_eq!(report.documents_created, 3);
    assert!(report.skipped.is_empty());
    assert!(report.upload_failures.is_empty());
    assert_eq!(report.assets_restored, 3);
    // Placeholder root (folders option set) plus the two archived folders.
    assert_eq!(report.folders_created, 3);

    // Binaries landed at their deterministic live paths.
    let base = "worlds/w2/adventures/Roundtrip_Adventure";
    assert!(fx.storage.exists(&format!("{base}/scene/images/s1/cave.jpg")));
    assert!(fx
        .storage
        .exists(&format!("{base}/scene/tokenimage/t1/goblin.png")));
    assert!(fx
        .storage
        .exists(&format!("{base}/journal/images/j1/handout.png")));

    // The restored documents reference the live paths.
    let scenes = fx.target.list(DocumentKind::Scene).unwrap();
    assert_eq!(scenes.len(), 1);
    let scene = fx.target.document(DocumentKind::Scene, &scenes[0]).unwrap();
    let token_img = format!("{base}/scene/tokenimage/t1/goblin.png");
    assert_eq!(scene["tokens"][0]["img"], json!(token_img));
    assert_eq!(scene["tokens"][1]["img"], json!(token_img));

    // The scene's folder parent was remapped to a live folder id.
    let scene_folder = scene["folder"].as_str().unwrap();
    let folders = fx.target.folders().unwrap();
    let caves = folders
        .iter()
        .find(|f| f.id == scene_folder)
        .expect("scene folder exists");
    assert_eq!(caves.name, "Caves");
    let chapter = folders
        .iter()
        .find(|f| f.id == *caves.parent.as_ref().unwrap())
        .expect("parent exists");
    assert_eq!(chapter.name, "Chapter 1");

    // Sentinel round-trip: the external reference came back unchanged and
    // was never uploaded.
    let items = fx.target.list(DocumentKind::Item).unwrap();
    let item = fx.target.document(DocumentKind::Item, &items[0]).unwrap();
    assert_eq!(item["img"], json!("https://example.com/relic.png"));

    // Journal content: local reference restored, remote untouched.
    let journals = fx.target.list(DocumentKind::Journal).unwrap();
    let journal = fx
        .target
        .document(DocumentKind::Journal, &journals[0])
        .unwrap();
    let content = journal["content"].as_str().unwrap();
    assert!(content.contains(&format!("src=\"{base}/journal/images/j1/handout.png\"")));
    assert!(content.contains("src=\"https://example.com/x.png\""));

    // Access control never crosses worlds.
    assert!(scene.get("permission").is_none());
}

#[test]
fn reimporting_the_same_archive_is_idempotent_for_folders() {
    let mut fx = fixture();

    let exporter = Exporter::new(
        &fx.storage,
        ExportOptions {
            name: "Twice".to_string(),
            preserve_folders: true,
            ..ExportOptions::default()
        },
    );
    let selection = full_selection(&fx.source);
    let output = exporter
        .export(&fx.source, &selection, &mut NullProgress)
        .unwrap();

    let importer = Importer::new(&fx.storage, ImportOptions::new("w2"));
    let first = importer
        .import(output.bytes.clone(), &mut fx.target, &mut NullProgress)
        .unwrap();
    let folders_after_first = fx.target.folders().unwrap().len();

    let second = importer
        .import(output.bytes, &mut fx.target, &mut NullProgress)
        .unwrap();

    assert_eq!(first.folders_created, folders_after_first);
    assert_eq!(second.folders_created, 0);
    // Both archived folders are recognized; the placeholder root is only
    // consulted when a new root folder has to be created.
    assert_eq!(second.folders_reused, 2);
    assert_eq!(fx.target.folders().unwrap().len(), folders_after_first);
}
