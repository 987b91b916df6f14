use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use idtk::archive::{self, WriteOptions};
use idtk::codec::Engine;
use idtk::container::Container;
use idtk::document::Document;
use idtk::header::CURRENT_VERSION;
use idtk::recovery::triage;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dtkfile", about = "Read, write and inspect IDTK serialized-population files")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the header and every document of a file
    Read {
        file: PathBuf,
        /// Write the header here instead of stdout
        #[arg(long)]
        header: Option<PathBuf>,
        /// Output file prefix (default: the input file's stem)
        #[arg(short, long)]
        output: Option<String>,
        /// Dump the stored (still compressed) chunk bytes instead of JSON
        #[arg(short, long)]
        raw: bool,
        /// Compact JSON output
        #[arg(short, long)]
        unformatted: bool,
    },
    /// Build a file from a simulation document and node documents
    Write {
        file: PathBuf,
        simulation: PathBuf,
        nodes: Vec<PathBuf>,
        #[arg(short, long, default_value = "unknown")]
        author: String,
        #[arg(short, long, default_value = "dtkfile")]
        tool: String,
        /// Store chunks uncompressed (overrides --engine)
        #[arg(long)]
        uncompressed: bool,
        /// Compression engine: lz4 (default), snappy, none
        #[arg(short, long, default_value = "lz4")]
        engine: Engine,
        /// Header version / document layout, 1-5
        #[arg(long, default_value_t = CURRENT_VERSION)]
        version: u32,
        /// Round-trip every chunk before writing
        #[arg(long)]
        verify: bool,
    },
    /// Show the header and the health of every chunk
    Info {
        file: PathBuf,
    },
    /// Flip one byte of a chunk to produce a damaged test fixture
    Corrupt {
        file: PathBuf,
        #[arg(short, long)]
        chunk: usize,
        /// Byte offset inside the chunk (default: the middle)
        #[arg(long)]
        offset: Option<usize>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { file, header, output, raw, unformatted } => {
            let container = archive::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            // Everything is rendered before the first file is written, so a
            // damaged input leaves nothing behind.
            let prefix = output.unwrap_or_else(|| stem(&file));
            let extracted = if raw {
                extract_raw(&container, &prefix)
            } else {
                extract_documents(&container, &prefix, unformatted)?
            };
            if !extracted.failed.is_empty() {
                let failed = &extracted.failed;
                bail!("{}: {} chunk(s) could not be decoded: {:?}", file.display(), failed.len(), failed);
            }

            let header_text = render(&container.header().to_value(), unformatted)?;
            let mut files = extracted.files;
            match header {
                Some(path) => files.insert(0, (path, header_text)),
                None => println!("{}", String::from_utf8_lossy(&header_text)),
            }
            write_all(&files)?;
            info!(path = %file.display(), files = files.len(), "extracted");
        }

        // ── Write ────────────────────────────────────────────────────────────
        Commands::Write { file, simulation, nodes, author, tool, uncompressed, engine, version, verify } => {
            let options = WriteOptions {
                engine: if uncompressed { Engine::None } else { engine },
                author,
                tool,
                version,
                verify,
            };
            let sim = load_document(&simulation)?;
            let docs = nodes.iter().map(|p| load_document(p)).collect::<anyhow::Result<Vec<_>>>()?;
            let container = archive::create(&file, sim, docs, &options)
                .with_context(|| format!("writing {}", file.display()))?;
            info!(
                path = %file.display(),
                chunks = container.chunk_count(),
                bytes = container.header().total_len(),
                "created"
            );
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { file } => {
            let container = archive::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let h = container.header();
            let report = triage(&container);

            println!("── IDTK file ────────────────────────────────────────────");
            println!("  Path           {}", file.display());
            println!("  Version        {}", h.version);
            println!("  Author         {}", h.author);
            println!("  Tool           {}", h.tool);
            println!("  Date           {}", h.date);
            println!("  Compression    {}", h.compression);
            println!("  Chunks         {}", h.chunk_count());
            println!("  Bytes          {}", h.byte_count());
            if !h.build.is_empty() {
                if let serde_json::Value::Object(fields) = serde_json::to_value(&h.build)? {
                    for (key, value) in fields {
                        println!("  {key:<22} {value}");
                    }
                }
            }
            println!();
            println!("{:>6} {:>12} {:>10} {:>8}  Health", "Chunk", "Offset", "Size", "CRC32");
            for c in &report.chunks {
                println!("{:>6} {:>12} {:>10} {:08x}  {}", c.index, c.offset, c.size, c.checksum, c.health.label());
            }
            for c in report.chunks.iter().filter(|c| !c.health.is_usable()) {
                println!("  chunk {}: {:?}", c.index, c.health);
            }
            println!("{}", report.summary());
        }

        // ── Corrupt ──────────────────────────────────────────────────────────
        Commands::Corrupt { file, chunk, offset, output } => {
            let mut container = archive::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut bytes = container
                .chunk(chunk)
                .with_context(|| format!("corrupting {}", file.display()))?
                .to_vec();
            let len = bytes.len();
            let at = offset.unwrap_or(len / 2);
            let byte = bytes.get_mut(at).ok_or_else(|| {
                anyhow!("{}: offset {at} is outside chunk {chunk} ({len} bytes)", file.display())
            })?;
            *byte ^= 0xff;
            container.set_chunk(chunk, bytes)?;
            archive::write(&mut container, &output, false)
                .with_context(|| format!("writing {}", output.display()))?;
            warn!(chunk, offset = at, output = %output.display(), "wrote damaged copy");
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

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

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dtk".to_owned())
}

fn render(doc: &Document, unformatted: bool) -> anyhow::Result<Vec<u8>> {
    Ok(if unformatted {
        serde_json::to_vec(doc)?
    } else {
        serde_json::to_vec_pretty(doc)?
    })
}

fn load_document(path: &Path) -> anyhow::Result<Document> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

fn output_name(prefix: &str, k: Option<usize>, ext: &str) -> String {
    match k {
        None    => format!("{prefix}.simulation.{ext}"),
        Some(k) => format!("{prefix}.node-{k:05}.{ext}"),
    }
}

/// Rendered output files, or the chunk indices that kept them from being
/// produced.
#[derive(Default)]
struct Extracted {
    files:  Vec<(PathBuf, Vec<u8>)>,
    failed: Vec<usize>,
}

/// Stored chunk bytes, compressed as on disk.
fn extract_raw(container: &Container, prefix: &str) -> Extracted {
    let mut out = Extracted::default();
    for index in 0..container.chunk_count() {
        match container.chunk(index) {
            Ok(bytes) if !container.is_truncated(index) => {
                let name = output_name(prefix, index.checked_sub(1), "bin");
                out.files.push((PathBuf::from(name), bytes.to_vec()));
            }
            Ok(_) => {
                warn!(index, "chunk is truncated");
                out.failed.push(index);
            }
            Err(e) => {
                warn!(index, error = %e, "skipping chunk");
                out.failed.push(index);
            }
        }
    }
    out
}

/// Simulation and node views as JSON.
fn extract_documents(container: &Container, prefix: &str, unformatted: bool) -> anyhow::Result<Extracted> {
    let mut out = Extracted::default();
    match container.simulation() {
        Ok(sim) => {
            let name = output_name(prefix, None, "json");
            out.files.push((PathBuf::from(name), render(&sim, unformatted)?));
        }
        Err(e) => {
            warn!(index = 0, error = %e, "skipping simulation");
            out.failed.push(0);
        }
    }

    let count = match container.node_count() {
        Ok(n) => n,
        // Version 1 nodes live in chunk 0, already reported above.
        Err(_) => return Ok(out),
    };
    for k in 0..count {
        match container.node(k) {
            Ok(node) => {
                let name = output_name(prefix, Some(k), "json");
                out.files.push((PathBuf::from(name), render(node, unformatted)?));
            }
            Err(e) => {
                let index = container.node_chunk_index(k);
                warn!(index, error = %e, "skipping node");
                out.failed.push(index);
            }
        }
    }
    Ok(out)
}

/// Write every file, removing the ones already written if any write fails.
fn write_all(files: &[(PathBuf, Vec<u8>)]) -> anyhow::Result<()> {
    for (k, (path, bytes)) in files.iter().enumerate() {
        if let Err(e) = fs::write(path, bytes) {
            for (written, _) in &files[..k] {
                if let Err(cleanup) = fs::remove_file(written) {
                    warn!(path = %written.display(), error = %cleanup, "could not remove partial output");
                }
            }
            return Err(e).with_context(|| format!("writing {}", path.display()));
        }
    }
    Ok(())
}
