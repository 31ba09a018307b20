//! RangeScan CLI
//!
//! Multi-core secp256k1 keyspace scanner for hash160 target lists.

mod prompt;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use rangescan_core::{
    format_duration, format_keys, hex, print_discovery, run_benchmark, scalar, CheckpointStore, EncodingScan,
    KeySearch, RecordKind, ScanConfig, ScanMode, ScanReport, StopReason, TargetIndex, U256,
};

#[derive(Parser)]
#[command(name = "rangescan")]
#[command(author = "RangeScan Team")]
#[command(version = "0.1.0")]
#[command(about = "Multi-core secp256k1 keyspace scanner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the keyspace for keys matching a target list
    Scan(ScanArgs),

    /// Normalize an address or public-key list to HASH160 lines
    Convert {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Input record format
        #[arg(short, long, default_value = "address")]
        format: FormatArg,

        /// Output file (default: <input>_converted.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Measure derivation throughput
    Benchmark {
        /// Keys per single-thread stage
        #[arg(short, long, default_value = "20000")]
        samples: u64,

        /// Seconds for the multi-worker run (0 = skip)
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Number of threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,
    },
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Target list file
    #[arg(short, long, default_value = "targets.txt")]
    pub targets: PathBuf,

    /// Format of the target list
    #[arg(short, long, default_value = "address")]
    pub format: FormatArg,

    /// Public-key encodings to check
    #[arg(short, long, default_value = "compressed")]
    pub encoding: EncodingArg,

    /// Operation mode
    #[arg(short, long, default_value = "sequential")]
    pub mode: ModeArg,

    /// Starting bit length: start at 2^(bits-1) (sequential, geometric)
    #[arg(long, conflicts_with = "start")]
    pub start_bit: Option<u32>,

    /// Explicit start value, decimal or 0x-hex (sequential, geometric)
    #[arg(long)]
    pub start: Option<String>,

    /// Resume a sequential scan from the checkpoint file
    #[arg(long)]
    pub resume: bool,

    /// Per-worker stride multiplier (sequential)
    #[arg(long, default_value = "1")]
    pub stride: u64,

    /// Multiplication factor (geometric)
    #[arg(long, default_value = "2")]
    pub multiplier: u64,

    /// Bit range, e.g. "66" or "10:20" (random; default full keyspace)
    #[arg(long)]
    pub range: Option<String>,

    /// Stop all workers after the first discovery
    #[arg(long)]
    pub stop_on_find: bool,

    /// Number of threads (0 = auto)
    #[arg(long, default_value = "0")]
    pub threads: usize,

    /// Candidates per worker batch
    #[arg(long, default_value = "10000")]
    pub batch_size: usize,

    /// Maximum keys (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub max_keys: u64,

    /// Maximum time in seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub max_time: u64,

    /// Results file (append-only)
    #[arg(long, default_value = "found_keys.txt")]
    pub results: PathBuf,

    /// Checkpoint file (sequential mode)
    #[arg(long, default_value = "checkpoint.json")]
    pub checkpoint: PathBuf,

    /// Seconds between checkpoint saves
    #[arg(long, default_value = "30")]
    pub checkpoint_interval: u64,

    /// Configure the run through interactive prompts
    #[arg(short, long)]
    pub interactive: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Address,
    Hash160,
    Pubkey,
}

impl From<FormatArg> for RecordKind {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Address => RecordKind::Address,
            FormatArg::Hash160 => RecordKind::Hash160,
            FormatArg::Pubkey => RecordKind::PubKey,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Compressed,
    Uncompressed,
    Both,
}

impl From<EncodingArg> for EncodingScan {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Compressed => EncodingScan::CompressedOnly,
            EncodingArg::Uncompressed => EncodingScan::UncompressedOnly,
            EncodingArg::Both => EncodingScan::Both,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Sequential,
    Random,
    Geometric,
}

fn main() -> Result<()> {
    // Logs go to stderr; results and the status line own stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => {
            let args = if args.interactive {
                prompt::run_scan_menu(args)?
            } else {
                args
            };
            cmd_scan(&args)?;
        }
        Commands::Convert {
            input,
            format,
            output,
        } => {
            cmd_convert(&input, format.into(), output)?;
        }
        Commands::Benchmark {
            samples,
            duration,
            threads,
        } => {
            cmd_benchmark(samples, duration, threads)?;
        }
    }

    Ok(())
}

fn cmd_scan(args: &ScanArgs) -> Result<()> {
    rangescan_core::self_test().context("cryptographic self-test failed")?;

    let kind: RecordKind = args.format.into();
    let load = TargetIndex::load(&args.targets, kind)?;

    let mode = build_mode(args)?;
    let config = ScanConfig {
        threads: args.threads,
        batch_size: args.batch_size,
        mode,
        encodings: args.encoding.into(),
        stop_on_find: args.stop_on_find,
        max_keys: args.max_keys,
        max_time_secs: args.max_time,
        results_path: Some(args.results.clone()),
        checkpoint_path: Some(args.checkpoint.clone()),
        checkpoint_interval_secs: args.checkpoint_interval,
        show_progress: !args.json,
    };

    let unique = load.index.len();
    let search = KeySearch::new(Arc::new(load.index), config);

    if !args.json {
        eprintln!("RangeScan v0.1.0");
        eprintln!(
            "Targets: {} unique ({} accepted, {} skipped)",
            unique, load.accepted, load.skipped
        );
        eprintln!("Mode: {}", mode);
        eprintln!("Threads: {}", search.worker_count());
        if let ScanMode::Sequential { .. } = mode {
            eprintln!("Workers 0-{} scan disjoint residue classes", search.worker_count() - 1);
        }
        eprintln!();
    }

    let token = search.stop_token();
    ctrlc::set_handler(move || {
        eprintln!("\n[!] Stopping...");
        token.stop(StopReason::Interrupted);
    })
    .context("failed to install Ctrl-C handler")?;

    let report = search.run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &args.results);
    }

    Ok(())
}

/// Turn the CLI parameters into a scan mode.
pub fn build_mode(args: &ScanArgs) -> Result<ScanMode> {
    let start = || -> Result<U256> {
        if let Some(value) = &args.start {
            return Ok(scalar::parse_scalar(value)?);
        }
        match args.start_bit {
            Some(bits) => Ok(scalar::bit_floor(bits)?),
            None => Ok(U256::one()),
        }
    };

    let mode = match args.mode {
        ModeArg::Sequential => {
            let start = if args.resume {
                let store = CheckpointStore::new(&args.checkpoint);
                let value = store.load();
                info!(path = %args.checkpoint.display(), %value, "resuming from checkpoint");
                value
            } else {
                start()?
            };
            ScanMode::Sequential {
                start,
                stride: args.stride,
            }
        }
        ModeArg::Random => {
            let (start, end) = match &args.range {
                Some(range) => scalar::parse_bit_range(range)?,
                None => (U256::one(), scalar::MAX_SCALAR),
            };
            ScanMode::Random { start, end }
        }
        ModeArg::Geometric => ScanMode::Geometric {
            start: start()?,
            multiplier: args.multiplier,
        },
    };

    if args.resume && args.mode != ModeArg::Sequential {
        warn!("--resume only applies to sequential mode; ignored");
    }

    Ok(mode)
}

fn print_summary(report: &ScanReport, results: &Path) {
    println!();
    println!("{:-<60}", "");
    println!("Stopped:     {:?}", report.stop_reason);
    println!("Keys Tested: {} ({})", report.keys_processed, format_keys(report.keys_processed));
    println!(
        "Time:        {:.2}s ({})",
        report.time_secs,
        format_duration(report.time_secs)
    );
    println!("Speed:       {:.2} k/s", report.keys_per_second / 1000.0);
    println!("Workers:     {}", report.workers);
    println!("Found:       {}", report.discoveries.len());
    if let Some(resume) = report.resume_value {
        println!("Resume at:   {}", resume);
    }
    println!("{:-<60}", "");
    if !report.discoveries.is_empty() {
        println!("Results saved to '{}'", results.display());
    }
}

fn cmd_convert(input: &Path, kind: RecordKind, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let mut name = input.as_os_str().to_owned();
        name.push("_converted.txt");
        PathBuf::from(name)
    });

    let content =
        fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;

    let load = TargetIndex::from_bytes(&content, kind);
    if load.accepted == 0 {
        return Err(anyhow!("No valid {} records in {}", kind, input.display()));
    }

    let mut out = std::io::BufWriter::new(
        fs::File::create(&output)
            .with_context(|| format!("failed to create {}", output.display()))?,
    );
    for fingerprint in load.index.sorted_fingerprints() {
        writeln!(out, "{}", hex::encode(fingerprint))?;
    }
    out.flush()?;

    eprintln!(
        "Converted {} records ({} skipped, {} unique) -> {}",
        load.accepted,
        load.skipped,
        load.index.len(),
        output.display()
    );
    Ok(())
}

fn cmd_benchmark(samples: u64, duration_secs: u64, threads: usize) -> Result<()> {
    eprintln!("Benchmarking single-thread pipeline ({} keys per stage)...", samples);
    let report = run_benchmark(samples);

    println!("{:-<60}", "");
    println!("Key generation:          {:>10.1} k/s", report.keygen_kps / 1000.0);
    println!("+ compressed hash160:    {:>10.1} k/s", report.compressed_kps / 1000.0);
    println!("+ uncompressed hash160:  {:>10.1} k/s", report.uncompressed_kps / 1000.0);
    println!("+ both:                  {:>10.1} k/s", report.both_kps / 1000.0);
    println!("{:-<60}", "");

    if duration_secs == 0 {
        return Ok(());
    }

    // A fingerprint no key will hash to, so the run lasts the full duration
    let targets = TargetIndex::from_iter([[0u8; 20]]);
    let config = ScanConfig {
        threads,
        max_time_secs: duration_secs,
        mode: ScanMode::Random {
            start: U256::one(),
            end: scalar::MAX_SCALAR,
        },
        ..Default::default()
    };
    let search = KeySearch::new(Arc::new(targets), config);
    eprintln!(
        "Running {} workers for {} seconds...",
        search.worker_count(),
        duration_secs
    );
    let result = search.run()?;
    for discovery in &result.discoveries {
        print_discovery(discovery);
    }

    println!(
        "Multi-core ({} workers): {:.1} k/s over {} keys",
        result.workers,
        result.keys_per_second / 1000.0,
        format_keys(result.keys_processed)
    );
    Ok(())
}
