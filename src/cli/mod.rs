//! # CLI Module
//!
//! Command-line interface for the hash indexer.
//!
//! ## Usage
//! ```bash
//! # Index every job under images/ in a local store
//! hash-index build --store-root /data/bucket
//!
//! # Advanced permutations, Parquet output
//! hash-index build --store-root /data/bucket --mode advanced --format parquet
//!
//! # Settings from a file, flags win
//! hash-index build --store-root /data/bucket --config indexer.json --workers 4
//!
//! # JSON summary for scripting
//! hash-index build --store-root /data/bucket --output-style json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_hash_indexer::config::IndexerConfig;
use image_hash_indexer::core::hasher::HashMode;
use image_hash_indexer::core::index::IndexFormat;
use image_hash_indexer::core::pipeline::{IndexRun, RunReport};
use image_hash_indexer::core::store::LocalFsStore;
use image_hash_indexer::error::Result;
use image_hash_indexer::events::{
    EnumerateEvent, Event, EventChannel, HashEvent, PipelineEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;

/// Image Hash Indexer - incremental perceptual-hash index of an object store
#[derive(Parser, Debug)]
#[command(name = "hash-index")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash new and changed images and update the index
    Build(BuildArgs),
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Directory acting as the object store
    #[arg(long)]
    store_root: PathBuf,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prefix whose children are jobs
    #[arg(long)]
    root_prefix: Option<String>,

    /// Permutation set
    #[arg(long)]
    mode: Option<Mode>,

    /// Resize width before hashing
    #[arg(long)]
    width: Option<u32>,

    /// Resize height before hashing
    #[arg(long)]
    height: Option<u32>,

    /// Index path (extension follows --format)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Index file format
    #[arg(long)]
    format: Option<Format>,

    /// State snapshot path (.db/.sqlite for SQLite)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only index the first N jobs
    #[arg(long)]
    max_jobs: Option<usize>,

    /// Stop submitting work after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// How to print the run summary
    #[arg(long, default_value = "pretty")]
    output_style: OutputStyle,

    /// List every skipped object
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Original plus horizontal and vertical flips
    Basic,
    /// Basic plus rotations, zoom, brightness and contrast
    Advanced,
}

impl From<Mode> for HashMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Basic => HashMode::Basic,
            Mode::Advanced => HashMode::Advanced,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

impl From<Format> for IndexFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => IndexFormat::Csv,
            Format::Parquet => IndexFormat::Parquet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputStyle {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => run_build(args),
    }
}

impl BuildArgs {
    /// Config file (or defaults) with flags layered on top
    fn to_config(&self) -> Result<IndexerConfig> {
        let mut config = match &self.config {
            Some(path) => IndexerConfig::from_json_file(path)?,
            None => IndexerConfig::default(),
        };

        if let Some(root_prefix) = &self.root_prefix {
            config.root_prefix = root_prefix.clone();
        }
        if let Some(mode) = self.mode {
            config.hash_mode = mode.into();
        }
        if let Some(width) = self.width {
            config.resize_width = width;
        }
        if let Some(height) = self.height {
            config.resize_height = height;
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(format) = self.format {
            config.output_format = format.into();
        }
        if let Some(state) = &self.state {
            config.state_path = state.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.max_jobs.is_some() {
            config.max_jobs = self.max_jobs;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }

        Ok(config)
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(args.output_style, OutputStyle::Pretty);

    let config = args.to_config()?;

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Image Hash Indexer").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line(&format!(
            "  {} mode ({}), {}x{}, {} workers",
            style(config.hash_mode).yellow(),
            style(config.hash_mode.description()).dim(),
            config.resize_width,
            config.resize_height,
            config.workers
        ))
        .ok();
        term.write_line("").ok();
    }

    let store = LocalFsStore::new(&args.store_root);
    let (sender, receiver) = EventChannel::new();

    // Length grows as the enumerator submits work
    let progress = if pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose = args.verbose;

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Enumerate(EnumerateEvent::JobFound { job_number, images }) => {
                    if verbose {
                        pb.println(format!("  job {} ({} images)", job_number, images));
                    }
                }
                Event::Enumerate(EnumerateEvent::JobFailed { prefix, message }) => {
                    pb.println(format!(
                        "  {} job {} skipped: {}",
                        style("!").yellow(),
                        prefix,
                        message
                    ));
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_length(p.submitted as u64);
                    pb.set_position(p.completed as u64);
                    if verbose {
                        pb.set_message(format!(
                            "{} (unchanged: {})",
                            p.current_key.rsplit('/').next().unwrap_or_default(),
                            p.skipped_unchanged
                        ));
                    }
                }
                Event::Hash(HashEvent::Skipped { key, stage, message }) => {
                    if verbose {
                        pb.println(format!(
                            "  {} {} [{}] {}",
                            style("✗").red(),
                            key,
                            stage,
                            style(message).dim()
                        ));
                    }
                }
                Event::Pipeline(PipelineEvent::Interrupted) => {
                    pb.set_message("stopping early".to_string());
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = IndexRun::new(&config, &store).execute(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let report = result?;

    match args.output_style {
        OutputStyle::Pretty => print_pretty_report(&term, &report, verbose),
        OutputStyle::Json => print_json_report(&report),
    }

    Ok(())
}

fn print_pretty_report(term: &Term, report: &RunReport, verbose: bool) {
    let (mark, title) = if report.incomplete {
        (style("◐").yellow().bold(), "Index Partially Updated")
    } else {
        (style("✓").green().bold(), "Index Updated")
    };
    term.write_line(&format!("{} {}", mark, title)).ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} jobs, {} images found in {:.1}s",
        style(report.jobs_discovered).cyan(),
        style(report.candidates_found).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} hashed, {} unchanged",
        style(report.processed).green(),
        style(report.skipped_unchanged).dim()
    ))
    .ok();

    if report.failed > 0 {
        term.write_line(&format!(
            "  {} failed (will be retried next run)",
            style(report.failed).red()
        ))
        .ok();
    }
    if report.jobs_failed > 0 {
        term.write_line(&format!(
            "  {} jobs could not be listed",
            style(report.jobs_failed).red()
        ))
        .ok();
    }
    if report.not_attempted > 0 {
        term.write_line(&format!(
            "  {} not attempted before the timeout",
            style(report.not_attempted).yellow()
        ))
        .ok();
    }

    term.write_line("").ok();

    if report.index_written {
        term.write_line(&format!(
            "  {} rows written to {}",
            style(report.rows_in_index).cyan(),
            report.output_path.display()
        ))
        .ok();
    } else {
        term.write_line(&format!(
            "  No changes; {} left untouched ({} rows)",
            report.output_path.display(),
            report.rows_in_index
        ))
        .ok();
    }

    if verbose && !report.failures.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Failures:").bold().underlined()))
            .ok();
        for failure in &report.failures {
            term.write_line(&format!(
                "  {} [{}] {}",
                failure.key,
                failure.stage,
                style(&failure.message).dim()
            ))
            .ok();
        }
    }
}

fn print_json_report(report: &RunReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize report: {}", e),
    }
}
