//! Scan supervisor
//!
//! Partitions the keyspace, runs one worker per core on a rayon pool, and
//! drives the reporting loop (status line, discoveries, checkpoints) on the
//! calling thread until every worker has returned.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use primitive_types::U256;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::{StopReason, StopToken};
use crate::checkpoint::CheckpointStore;
use crate::ledger::{Discovery, DiscoveryLedger};
use crate::partition::{partition, AdvanceRule, ScanMode, WorkerPlan};
use crate::scalar::MAX_SCALAR;
use crate::stats::{format_status, ProgressAggregator};
use crate::targets::TargetIndex;
use crate::worker::{EncodingScan, ScanWorker, WorkerContext, WorkerExit};

/// How often the reporting loop wakes up
const REPORT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Target index is empty")]
    NoTargets,
    #[error(transparent)]
    Crypto(#[from] rangescan_crypto::CryptoError),
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to start scan thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("A scan worker panicked")]
    WorkerPanicked,
}

/// Scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of workers (0 = auto)
    pub threads: usize,
    /// Candidates per worker between shared-state updates
    pub batch_size: usize,
    pub mode: ScanMode,
    pub encodings: EncodingScan,
    /// Stop every worker after the first recorded discovery
    pub stop_on_find: bool,
    /// Maximum keys (0 = unlimited)
    pub max_keys: u64,
    /// Maximum time in seconds (0 = unlimited)
    pub max_time_secs: u64,
    /// Append-only discovery log
    pub results_path: Option<PathBuf>,
    /// Sequential resume file
    pub checkpoint_path: Option<PathBuf>,
    pub checkpoint_interval_secs: u64,
    /// Render the live status line and discovery banners
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threads: 0, // Auto-detect
            batch_size: 10_000,
            mode: ScanMode::Sequential {
                start: U256::one(),
                stride: 1,
            },
            encodings: EncodingScan::CompressedOnly,
            stop_on_find: false,
            max_keys: 0,
            max_time_secs: 0,
            results_path: None,
            checkpoint_path: None,
            checkpoint_interval_secs: 30,
            show_progress: true,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub discoveries: Vec<Discovery>,
    pub keys_processed: u64,
    pub time_secs: f64,
    pub keys_per_second: f64,
    pub workers: usize,
    pub stop_reason: StopReason,
    /// Sequential mode only: where a restart should resume
    pub resume_value: Option<U256>,
}

/// Multi-worker keyspace search
pub struct KeySearch {
    targets: Arc<TargetIndex>,
    config: ScanConfig,
    stop: StopToken,
}

impl KeySearch {
    pub fn new(targets: Arc<TargetIndex>, config: ScanConfig) -> Self {
        Self {
            targets,
            config,
            stop: StopToken::new(),
        }
    }

    /// Token for external cancellation (e.g. a Ctrl-C handler)
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Resolved worker count
    pub fn worker_count(&self) -> usize {
        if self.config.threads == 0 {
            num_cpus::get()
        } else {
            self.config.threads
        }
    }

    /// Run the search, blocking until a stop condition or exhaustion.
    pub fn run(&self) -> Result<ScanReport, ScanError> {
        rangescan_crypto::self_test()?;
        if self.targets.is_empty() {
            return Err(ScanError::NoTargets);
        }

        let partition = partition(&self.config.mode, self.worker_count());
        for warning in &partition.warnings {
            warn!("{}", warning);
        }
        let plans = partition.plans;
        let workers = plans.len();

        let checkpoint = match (&self.config.mode, &self.config.checkpoint_path) {
            (ScanMode::Sequential { .. }, Some(path)) => Some(CheckpointStore::new(path)),
            _ => None,
        };

        let progress = ProgressAggregator::new(workers);
        let (tx, rx) = unbounded();
        let ledger = Arc::new(DiscoveryLedger::new(
            self.config.results_path.clone(),
            Some(tx),
        ));

        let ctx = WorkerContext {
            targets: self.targets.clone(),
            ledger,
            progress: progress.clone(),
            stop: self.stop.clone(),
            encodings: self.config.encodings,
            batch_size: self.config.batch_size,
            stop_on_find: self.config.stop_on_find,
            max_keys: self.config.max_keys,
            max_time: (self.config.max_time_secs > 0)
                .then(|| Duration::from_secs(self.config.max_time_secs)),
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scan-worker-{i}"))
            .build()?;

        info!(
            mode = %self.config.mode,
            workers,
            targets = self.targets.len(),
            "starting scan"
        );

        let worker_plans = plans.clone();
        let search_handle = thread::Builder::new()
            .name("scan-supervisor".into())
            .spawn(move || {
                pool.install(|| {
                    worker_plans
                        .par_iter()
                        .map(|plan| ScanWorker::new(*plan, &ctx).run())
                        .collect::<Vec<WorkerExit>>()
                })
            })?;

        // Reporting loop
        let mut discoveries = Vec::new();
        let mut last_checkpoint = Instant::now();
        let checkpoint_every = Duration::from_secs(self.config.checkpoint_interval_secs.max(1));

        while !search_handle.is_finished() {
            self.receive(&rx, REPORT_INTERVAL, &mut discoveries);

            if self.config.show_progress {
                eprint!("\r{}", format_status(&progress.snapshot(), discoveries.len()));
            }

            if let Some(store) = &checkpoint {
                if last_checkpoint.elapsed() >= checkpoint_every {
                    if let Some(value) = resume_value(&plans, progress.min_steps()) {
                        store.save(value);
                    }
                    last_checkpoint = Instant::now();
                }
            }
        }

        let exits = search_handle.join().map_err(|_| ScanError::WorkerPanicked)?;
        while self.receive(&rx, Duration::ZERO, &mut discoveries) {}
        if self.config.show_progress {
            eprintln!("\r{}", format_status(&progress.snapshot(), discoveries.len()));
        }

        if exits.iter().all(|e| *e == WorkerExit::Exhausted) {
            self.stop.stop(StopReason::Exhausted);
        }
        let stop_reason = self.stop.reason().unwrap_or(StopReason::Exhausted);

        let resume = match self.config.mode {
            ScanMode::Sequential { .. } => resume_value(&plans, progress.min_steps()),
            _ => None,
        };
        if let (Some(store), Some(value)) = (&checkpoint, resume) {
            store.save(value);
            info!(path = %store.path().display(), %value, "final checkpoint saved");
        }

        let snapshot = progress.snapshot();
        info!(
            keys = snapshot.total_keys_processed,
            found = discoveries.len(),
            reason = ?stop_reason,
            "scan finished"
        );

        Ok(ScanReport {
            keys_processed: snapshot.total_keys_processed,
            time_secs: snapshot.elapsed.as_secs_f64(),
            keys_per_second: snapshot.keys_per_second(),
            discoveries,
            workers,
            stop_reason,
            resume_value: resume,
        })
    }

    /// Take at most one discovery off the channel. Returns whether one arrived.
    fn receive(
        &self,
        rx: &Receiver<Discovery>,
        timeout: Duration,
        discoveries: &mut Vec<Discovery>,
    ) -> bool {
        match rx.recv_timeout(timeout) {
            Ok(discovery) => {
                if self.config.show_progress {
                    print_discovery(&discovery);
                }
                discoveries.push(discovery);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Largest sequential base below which every key has been checked:
/// `start + min_steps * step`, for restarting with the same worker count.
pub fn resume_value(plans: &[WorkerPlan], min_steps: u64) -> Option<U256> {
    let first = plans.first()?;
    let AdvanceRule::Add(step) = first.advance_rule else {
        return None;
    };
    let value = step
        .checked_mul(U256::from(min_steps))
        .and_then(|offset| first.start_value.checked_add(offset))
        .map_or(MAX_SCALAR, |v| v.min(MAX_SCALAR));
    Some(value)
}

pub fn print_discovery(discovery: &Discovery) {
    println!();
    println!("{}", "█".repeat(75));
    println!("      KEY FOUND");
    println!("{}", "█".repeat(75));
    println!("[+] TYPE     : {}", discovery.encoding);
    println!("[+] ADDRESS  : {}", discovery.address);
    println!("[+] HASH160  : {}", discovery.fingerprint_hex);
    println!("[+] HEX      : {}", discovery.private_key_hex);
    println!("[+] INT      : {}", discovery.private_key_decimal);
    println!("[+] WIF (C)  : {}", discovery.wif_compressed);
    println!("[+] WIF (U)  : {}", discovery.wif_uncompressed);
    println!("{}", "█".repeat(75));
    println!();
}
