/*!
Caravan CLI - Command-line interface for the adventure archive system.

Exports a directory-backed world into a portable `.fvttadv` archive,
restores archives into a world, and provides utilities for inspecting and
verifying archives.
*/

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};
use tracing::{info, warn};

use caravan_core::{
    create_storage, ArchiveReader, DocumentKind, ExportOptions, Exporter, FsWorld, ImportOptions,
    Importer, ProgressSink, StorageConfig, WorldSource, FOLDERS_ENTRY, MANIFEST_ENTRY,
};

#[derive(Parser)]
#[command(name = "caravan")]
#[command(about = "CLI for the caravan adventure archive system")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory for live asset storage (overrides CARAVAN_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a world's content into an adventure archive
    Export {
        /// World directory to export from
        #[arg(short, long)]
        world: PathBuf,
        /// Output archive path (defaults to the sanitized adventure name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Adventure name
        #[arg(short, long, default_value = "")]
        name: String,
        /// Adventure description
        #[arg(long, default_value = "")]
        description: String,
        /// Game system identifier recorded in the manifest
        #[arg(long, default_value = "generic")]
        system: String,
        /// Active extension titles recorded in the manifest
        #[arg(long = "module")]
        modules: Vec<String>,
        /// Record that the folder tree should be preserved on import
        #[arg(long)]
        preserve_folders: bool,
        /// Restrict the export to these document kinds
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },
    /// Restore an adventure archive into a world
    Import {
        /// Archive file to import
        archive: PathBuf,
        /// World directory to import into
        #[arg(short, long)]
        world: PathBuf,
        /// World identifier used in restored asset paths
        #[arg(long, default_value = "world")]
        world_id: String,
    },
    /// List the contents of an adventure archive
    Inspect {
        /// Archive file to inspect
        archive: PathBuf,
    },
    /// Check that an archive is structurally sound
    Verify {
        /// Archive file to verify
        archive: PathBuf,
    },
}

#[derive(Tabled)]
struct DocumentRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

/// Progress line on stderr; redrawn in place.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn update(&mut self, current: usize, total: usize, label: &str) {
        eprint!("\r[{current}/{total}] {label}\x1b[K");
        let _ = std::io::stderr().flush();
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = StorageConfig::from_env();
    if let Some(dir) = &cli.data_dir {
        config = StorageConfig::local_with_base(dir.clone());
    }

    match cli.command {
        Commands::Export {
            world,
            output,
            name,
            description,
            system,
            modules,
            preserve_folders,
            kinds,
        } => export(
            &config,
            &world,
            output,
            ExportOptions {
                name,
                description,
                system,
                modules,
                preserve_folders,
                ..ExportOptions::default()
            },
            &kinds,
        ),
        Commands::Import {
            archive,
            world,
            world_id,
        } => import(&config, &archive, &world, world_id),
        Commands::Inspect { archive } => inspect(&archive),
        Commands::Verify { archive } => verify(&archive),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_kinds(kinds: &[String]) -> Result<Vec<DocumentKind>, anyhow::Error> {
    if kinds.is_empty() {
        return Ok(DocumentKind::ALL.to_vec());
    }
    kinds
        .iter()
        .map(|k| {
            DocumentKind::from_dir_name(k)
                .with_context(|| format!("unknown document kind '{k}'"))
        })
        .collect()
}

fn export(
    config: &StorageConfig,
    world_dir: &PathBuf,
    output: Option<PathBuf>,
    options: ExportOptions,
    kinds: &[String],
) -> Result<(), anyhow::Error> {
    let storage = create_storage(config)?;
    let world = FsWorld::new(world_dir);

    let mut selection = Vec::new();
    for kind in parse_kinds(kinds)? {
        for id in world.list(kind)? {
            selection.push((kind, id));
        }
    }
    if selection.is_empty() {
        warn!("Nothing selected; the archive will only carry folders and metadata");
    }
    info!(documents = selection.len(), "Exporting adventure");

    let exporter = Exporter::new(storage.as_ref(), options);
    let result = exporter.export(&world, &selection, &mut ConsoleProgress);
    eprintln!();
    let output_data = result?;

    let path = output.unwrap_or_else(|| PathBuf::from(&output_data.filename));
    std::fs::write(&path, &output_data.bytes)
        .with_context(|| format!("failed to write archive to {}", path.display()))?;

    println!(
        "Exported {} document(s) and {} asset(s) to {}",
        output_data.report.documents_exported,
        output_data.report.assets_packed,
        path.display()
    );
    for (kind, id) in &output_data.report.skipped {
        println!("  skipped {kind} {id} (see log)");
    }
    for warning in &output_data.report.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn import(
    config: &StorageConfig,
    archive_path: &PathBuf,
    world_dir: &PathBuf,
    world_id: String,
) -> Result<(), anyhow::Error> {
    let storage = create_storage(config)?;
    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("failed to read archive {}", archive_path.display()))?;
    let mut world = FsWorld::new(world_dir);

    let importer = Importer::new(storage.as_ref(), ImportOptions::new(world_id));
    let result = importer.import(bytes, &mut world, &mut ConsoleProgress);
    eprintln!();
    let report = result?;

    println!(
        "Imported '{}': {} document(s), {} folder(s) created, {} reused, {} asset(s) restored",
        report.manifest.name,
        report.documents_created,
        report.folders_created,
        report.folders_reused,
        report.assets_restored
    );
    for (kind, id) in &report.skipped {
        println!("  skipped {kind} {id} (see log)");
    }
    for failure in &report.upload_failures {
        println!("  upload failed: {failure}");
    }
    Ok(())
}

fn inspect(archive_path: &PathBuf) -> Result<(), anyhow::Error> {
    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("failed to read archive {}", archive_path.display()))?;
    let size = bytes.len() as u64;
    let mut reader = ArchiveReader::open(bytes)?;

    if reader.contains(MANIFEST_ENTRY) {
        let manifest = reader.read_json(MANIFEST_ENTRY)?;
        println!("Adventure: {}", manifest["name"].as_str().unwrap_or("?"));
        if let Some(description) = manifest["description"].as_str() {
            if !description.is_empty() {
                println!("  Description: {description}");
            }
        }
        println!("  System: {}", manifest["system"].as_str().unwrap_or("?"));
        println!("  Schema version: {}", manifest["version"]);
        println!(
            "  Preserve folders: {}",
            manifest["options"]["folders"].as_bool().unwrap_or(false)
        );
    } else {
        println!("Warning: archive has no {MANIFEST_ENTRY}");
    }
    println!("  Size: {}", format_size(size));
    if let Ok(modified) = std::fs::metadata(archive_path).and_then(|m| m.modified()) {
        println!("  Modified: {}", format_timestamp(modified));
    }

    let documents = reader.documents();
    let binaries = reader
        .entry_names()
        .iter()
        .filter(|n| !n.ends_with(".json"))
        .count();
    println!("  Documents: {}   Binaries: {}", documents.len(), binaries);

    let mut rows = Vec::new();
    for (kind, id) in documents {
        let name = reader
            .read_json(&format!("{}/{}.json", kind.dir_name(), id))
            .ok()
            .and_then(|doc| doc["name"].as_str().map(str::to_string))
            .unwrap_or_default();
        rows.push(DocumentRow {
            kind: kind.to_string(),
            id,
            name,
        });
    }
    if !rows.is_empty() {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

fn verify(archive_path: &PathBuf) -> Result<(), anyhow::Error> {
    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("failed to read archive {}", archive_path.display()))?;
    let mut reader = ArchiveReader::open(bytes)?;

    if !reader.contains(MANIFEST_ENTRY) {
        bail!("archive is missing {MANIFEST_ENTRY}");
    }
    let manifest: caravan_core::AdventureManifest =
        serde_json::from_value(reader.read_json(MANIFEST_ENTRY)?)
            .context("manifest does not match the expected schema")?;
    manifest.validate()?;
    if !manifest.is_compatible() {
        bail!("unsupported archive schema version {}", manifest.version);
    }

    if reader.contains(FOLDERS_ENTRY) {
        let _: Vec<caravan_core::FolderRecord> =
            serde_json::from_value(reader.read_json(FOLDERS_ENTRY)?)
                .context("folder listing does not match the expected schema")?;
    }

    let mut broken = 0usize;
    for (kind, id) in reader.documents() {
        if reader
            .read_json(&format!("{}/{}.json", kind.dir_name(), id))
            .is_err()
        {
            println!("  unreadable document: {kind} {id}");
            broken += 1;
        }
    }

    if broken > 0 {
        bail!("{broken} unreadable document(s)");
    }
    println!("✓ Archive '{}' is structurally sound", manifest.name);
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_timestamp(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Local> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}
