//! CLI tool for assembling a PowerPoint deck from slides of other decks.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use deck_core::{Compression, DeckSummary, MergeOptions, PresentationFormat, SlideRequest};
use deck_pptx::{merge_slides, PptxParser};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Merge slides from several .pptx files into one presentation.
#[derive(Parser, Debug)]
#[command(name = "deck-merge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a new presentation from the requested slides, in order
    Merge(MergeArgs),

    /// List the slides of one or more presentations
    Inspect {
        /// Presentation file(s) to read
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Slides to include, as PATH:INDEX (or CODE:INDEX with --sources-dir)
    slides: Vec<String>,

    /// Output .pptx file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON manifest with `output`, `slides` and `options`
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Directory holding source decks named <CODE>.pptx
    #[arg(long)]
    sources_dir: Option<PathBuf>,

    /// Directory for temporary extraction (default: system temp dir)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Store entries uncompressed
    #[arg(long)]
    store: bool,

    /// Keep parts no relationship refers to
    #[arg(long)]
    keep_unreferenced: bool,

    /// Print the merge report as JSON
    #[arg(long)]
    json: bool,
}

/// On-disk form of a merge job.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Manifest {
    output: Option<PathBuf>,
    slides: Vec<SlideRequest>,
    options: MergeOptions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Command::Merge(args) => run_merge(&args),
        Command::Inspect { input, json } => run_inspect(&input, json),
    }
}

fn run_merge(args: &MergeArgs) -> Result<()> {
    let manifest = match &args.manifest {
        Some(path) => read_manifest(path)?,
        None => Manifest::default(),
    };

    let output = args
        .output
        .clone()
        .or(manifest.output)
        .ok_or_else(|| anyhow::anyhow!("No output file given (use --output or the manifest's `output`)"))?;

    let mut options = manifest.options;
    if let Some(dir) = &args.scratch_dir {
        options.scratch_dir = Some(dir.clone());
    }
    if args.store {
        options.compression = Compression::Stored;
    }
    if args.keep_unreferenced {
        options.prune_unreferenced = false;
    }

    let mut requested = manifest.slides;
    for arg in &args.slides {
        let request: SlideRequest = arg
            .parse()
            .with_context(|| format!("Invalid slide request '{}'", arg))?;
        requested.push(request);
    }

    let requests: Vec<SlideRequest> = requested
        .into_iter()
        .filter_map(|request| resolve_request(request, args.sources_dir.as_deref()))
        .collect();

    let report = merge_slides(&requests, &output, &options)
        .with_context(|| format!("Failed to merge into {}", output.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Wrote {} of {} slides to {}",
            report.slides_written,
            report.slides_requested,
            report.output.display()
        );
        for warning in &report.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    Ok(())
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid manifest {}", path.display()))
}

/// Map a request onto a local file.
///
/// With a sources directory, a bare code such as `AG101` becomes
/// `<dir>/AG101.pptx` and other relative paths are taken from that
/// directory; requests whose file is not there are dropped with a warning.
/// Without one, paths pass through untouched.
fn resolve_request(request: SlideRequest, sources_dir: Option<&Path>) -> Option<SlideRequest> {
    let dir = match sources_dir {
        Some(dir) => dir,
        None => return Some(request),
    };

    let source = if request.source.is_absolute() {
        request.source.clone()
    } else if request.source.extension().is_none() {
        dir.join(format!("{}.pptx", request.source.display()))
    } else {
        dir.join(&request.source)
    };

    if source.is_file() {
        Some(SlideRequest::new(source, request.index))
    } else {
        log::warn!(
            "Skipping {}: {} is not available locally",
            request,
            source.display()
        );
        None
    }
}

fn run_inspect(inputs: &[PathBuf], json: bool) -> Result<()> {
    let mut summaries = Vec::with_capacity(inputs.len());
    for input_path in inputs {
        log::debug!("Inspecting: {}", input_path.display());
        summaries.push(inspect_file(input_path)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    for summary in &summaries {
        println!("{}: {} slides", summary.filename, summary.slides.len());
        for slide in &summary.slides {
            println!(
                "  {:>3}. {}  [{}]",
                slide.number,
                slide.title.as_deref().unwrap_or("(untitled)"),
                slide.part
            );
        }
    }
    Ok(())
}

/// Read a single presentation after checking its signature.
fn inspect_file(input_path: &Path) -> Result<DeckSummary> {
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let mut reader = BufReader::new(file);

    // Read magic bytes to detect format
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .with_context(|| "Failed to read file header")?;

    match PresentationFormat::from_magic(&magic) {
        Some(PresentationFormat::Pptx) => {}
        Some(PresentationFormat::Ppt) => {
            bail!("{} is a legacy .ppt file; only .pptx can be read", input_path.display())
        }
        None => bail!("{} is not a PowerPoint file", input_path.display()),
    }

    PptxParser::new()
        .parse_file(input_path)
        .with_context(|| format!("Failed to read {}", input_path.display()))
}
