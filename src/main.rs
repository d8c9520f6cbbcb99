//! SDNA CLI - Command-line tool for inspecting and loading object-graph snapshots.
//!
//! This is the main entry point for the SDNA command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use sdna::loader::{scan_schema_path, LoadedGraph};
use sdna::prelude::*;

/// SDNA - schema-evolving snapshot tool
#[derive(Parser)]
#[command(name = "sdna")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema stored in a snapshot with compiled member offsets
    Schema {
        /// Snapshot file
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the raw schema blob of a snapshot to a file
    ExtractSchema {
        /// Snapshot file
        file: PathBuf,

        /// Output blob file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Link a snapshot's schema against a memory schema and report differences
    Link {
        /// Memory schema blob, in the byte order and pointer width of this machine
        #[arg(short, long, env = "SDNA_MEMORY_SCHEMA")]
        memory: PathBuf,

        /// Snapshot file
        file: PathBuf,
    },

    /// Load snapshots into a memory schema
    Load {
        /// Memory schema blob, in the byte order and pointer width of this machine
        #[arg(short, long, env = "SDNA_MEMORY_SCHEMA")]
        memory: PathBuf,

        /// Snapshot files or directories to walk
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Struct type names whose records are skipped
        #[arg(short, long)]
        skip: Vec<String>,

        /// Only load files with this extension when walking directories
        #[arg(short, long)]
        extension: Option<String>,

        /// Expected 7-byte file identifier
        #[arg(long, default_value = "SNAPDNA")]
        identifier: String,

        /// Fail on streams that end without an end marker
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Schema { file, json } => {
            cmd_schema(&file, json)?;
        }
        Commands::ExtractSchema { file, output } => {
            cmd_extract_schema(&file, &output)?;
        }
        Commands::Link { memory, file } => {
            cmd_link(&memory, &file)?;
        }
        Commands::Load {
            memory,
            paths,
            skip,
            extension,
            identifier,
            strict,
        } => {
            let identifier: [u8; 7] = identifier
                .as_bytes()
                .try_into()
                .context("Identifier must be exactly 7 bytes")?;
            let mut config = LoaderConfig::new()
                .with_identifier(identifier)
                .with_tolerate_missing_end(!strict);
            for name in skip {
                config = config.skip_type(name);
            }
            cmd_load(&memory, &paths, extension.as_deref(), config)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read and compile the schema stored in a snapshot.
fn file_schema(file: &Path) -> Result<(FileHeader, CompiledSchema)> {
    let (header, blob) = scan_schema_path(file, &LoaderConfig::default())
        .with_context(|| format!("Failed to read schema from {}", file.display()))?;
    let options = SchemaOptions::new(header.endian, header.pointer_width);
    let compiled = CompiledSchema::from_blob(&blob, &options).context("Failed to compile schema")?;
    Ok((header, compiled))
}

fn cmd_schema(file: &Path, json: bool) -> Result<()> {
    let (header, compiled) = file_schema(file)?;

    if json {
        let out = serde_json::to_string_pretty(&compiled).context("Failed to encode schema")?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} version {}: {}-bit {:?}, {} names, {} types, {} structs",
        header.identifier_str(),
        header.version,
        header.pointer_width as u32 * 8,
        header.endian,
        compiled.schema().names().len(),
        compiled.schema().types().len(),
        compiled.structs().len()
    );

    for def in compiled.structs() {
        print!("\nstruct {} ({} bytes", compiled.struct_name(def), def.length);
        if def.misaligned {
            print!(", members span {}, misaligned", def.compiled_length);
        }
        println!(")");

        for member in &def.members {
            println!(
                "  {:>6} {:>5}  {:<12} {}",
                member.offset,
                member.size,
                compiled.member_type_name(member),
                compiled.member_path(member)
            );
        }
    }

    Ok(())
}

fn cmd_extract_schema(file: &Path, output: &Path) -> Result<()> {
    let (header, blob) = scan_schema_path(file, &LoaderConfig::default())
        .with_context(|| format!("Failed to read schema from {}", file.display()))?;
    fs::write(output, &blob).context("Failed to write output file")?;

    println!(
        "Wrote {} bytes ({}-bit {:?}) to {}",
        blob.len(),
        header.pointer_width as u32 * 8,
        header.endian,
        output.display()
    );

    Ok(())
}

fn cmd_link(memory: &Path, file: &Path) -> Result<()> {
    let memory = sdna::load_memory_schema(memory).context("Failed to load memory schema")?;
    let (_, compiled) = file_schema(file)?;

    let links = LinkGraph::link(&memory, &compiled);
    print!("{}", links.report(&memory, &compiled));

    Ok(())
}

fn cmd_load(
    memory: &Path,
    paths: &[PathBuf],
    extension: Option<&str>,
    config: LoaderConfig,
) -> Result<()> {
    let memory = sdna::load_memory_schema(memory).context("Failed to load memory schema")?;
    let memory = Arc::new(memory);
    let files = collect_files(paths, extension);
    tracing::debug!(structs = memory.structs().len(), "memory schema ready");
    println!("Loading {} files...", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let results: Vec<(PathBuf, sdna::loader::Result<LoadedGraph>)> = files
        .par_iter()
        .map(|path| {
            let mut loader = Loader::new(Arc::clone(&memory)).with_config(config.clone());
            let result = loader.load_path(path);
            pb.inc(1);
            (path.clone(), result)
        })
        .collect();
    pb.finish_with_message("Done");

    let mut loaded = 0;
    let mut errors = 0;
    for (path, result) in &results {
        match result {
            Ok(graph) => {
                loaded += 1;
                let counts: Vec<String> = graph
                    .counts_by_code()
                    .iter()
                    .map(|(code, count)| format!("{}={}", code, count))
                    .collect();
                let stats = graph.stats();
                println!(
                    "{}: {} records [{}], {} patched, {} dropped, {} unresolved pointers",
                    path.display(),
                    graph.len(),
                    counts.join(" "),
                    stats.patched,
                    stats.dropped,
                    stats.unresolved
                );
            }
            Err(e) => {
                eprintln!("Error loading {}: {} ({:?})", path.display(), e, e.kind());
                errors += 1;
            }
        }
    }

    println!(
        "Loaded {} files in {:?} ({} errors)",
        loaded,
        start.elapsed(),
        errors
    );

    Ok(())
}

/// Expand directories into the files below them.
fn collect_files(paths: &[PathBuf], extension: Option<&str>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = extension.map_or(true, |ext| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
            });
            if matches {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files
}
