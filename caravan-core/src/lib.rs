/*!
# Caravan Core Engine

Adventure archive export/import core library for tabletop worlds.

This crate packs a world's content (scenes, actors, items, journals, roll
tables, playlists, compendium packs, macros and the folder hierarchy) into a
single portable archive, and restores such archives into a live world:

- Every embedded binary-asset reference is rewritten to a stable
  archive-relative path exactly once, deduplicated across documents
- External and core assets are sentinel-marked and never touched
- Import remaps folder parents and document links from source identifiers to
  newly created ones through a run-scoped translation table
- Storage is pluggable behind an adapter trait (local filesystem by default,
  S3 behind the `s3` feature)

## Architecture

The core follows hexagonal architecture principles: the export/import
pipelines are isolated from infrastructure concerns, and the host's
collections, the asset backend and the progress display are all consumed
through capability traits.

## Usage

```rust,no_run
use caravan_core::{
    DocumentKind, ExportOptions, Exporter, FsWorld, ImportOptions, Importer,
    LocalAssetStorage, NullProgress, WorldSource,
};

# fn main() -> caravan_core::Result<()> {
let storage = LocalAssetStorage::new();
let world = FsWorld::new("worlds/my-world");

// Export every scene in the world.
let selection: Vec<_> = world
    .list(DocumentKind::Scene)?
    .into_iter()
    .map(|id| (DocumentKind::Scene, id))
    .collect();
let exporter = Exporter::new(&storage, ExportOptions::new("The Lost Mine"));
let output = exporter.export(&world, &selection, &mut NullProgress)?;
std::fs::write(&output.filename, &output.bytes)?;

// Restore the archive into another world.
let mut target = FsWorld::new("worlds/other-world");
let importer = Importer::new(&storage, ImportOptions::new("other-world"));
importer.import(output.bytes, &mut target, &mut NullProgress)?;
# Ok(())
# }
```
*/

pub mod archive;
pub mod assets;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod import;
pub mod manifest;
pub mod progress;
pub mod storage;
pub mod world;

pub use archive::{ArchiveReader, ArchiveWriter, FOLDERS_ENTRY, MANIFEST_ENTRY};
pub use assets::{classify, AssetClass, EXTERNAL_SENTINEL};
pub use config::{StorageBackend, StorageConfig};
pub use document::{AssetField, AssetRule, DocumentKind};
pub use error::{CaravanError, Result};
pub use export::{ExportOptions, ExportOutput, ExportReport, Exporter};
pub use import::{ImportOptions, ImportReport, Importer};
pub use manifest::{AdventureManifest, FolderFlags, FolderRecord, ManifestOptions, SCHEMA_VERSION};
pub use progress::{LogProgress, NullProgress, ProgressSink};
pub use storage::{create_storage, AssetStorage, BrowseOptions, BrowseResult, LocalAssetStorage};
#[cfg(feature = "s3")]
pub use storage::S3AssetStorage;
pub use world::{FsWorld, MemoryWorld, WorldSink, WorldSource};
