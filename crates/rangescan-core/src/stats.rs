//! Live scan statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shown when the display value cannot be read
pub const DISPLAY_PLACEHOLDER: &str = "SYNC";

/// Point-in-time view of a run's progress
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub total_keys_processed: u64,
    pub last_candidate_hex: String,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Get keys per second
    pub fn keys_per_second(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.total_keys_processed as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Thread-safe progress counters shared by all workers
#[derive(Debug)]
pub struct ProgressAggregator {
    keys_processed: AtomicU64,
    /// Completed advances per worker, for the sequential resume point
    worker_steps: Vec<AtomicU64>,
    display: Mutex<String>,
    start_time: Instant,
}

impl ProgressAggregator {
    pub fn new(workers: usize) -> Arc<Self> {
        Arc::new(Self {
            keys_processed: AtomicU64::new(0),
            worker_steps: (0..workers).map(|_| AtomicU64::new(0)).collect(),
            display: Mutex::new("Starting...".to_string()),
            start_time: Instant::now(),
        })
    }

    /// Increment keys processed by amount
    #[inline]
    pub fn add(&self, delta: u64) {
        self.keys_processed.fetch_add(delta, Ordering::Relaxed);
    }

    /// Record that `worker` has finished `steps` candidates of its plan.
    #[inline]
    pub fn record_steps(&self, worker: usize, steps: u64) {
        if let Some(slot) = self.worker_steps.get(worker) {
            slot.store(steps, Ordering::Release);
        }
    }

    /// Fewest completed steps across workers
    pub fn min_steps(&self) -> u64 {
        self.worker_steps
            .iter()
            .map(|s| s.load(Ordering::Acquire))
            .min()
            .unwrap_or(0)
    }

    /// Best-effort: skipped if another thread holds the lock.
    pub fn set_display(&self, hex: String) {
        if let Ok(mut display) = self.display.try_lock() {
            *display = hex;
        }
    }

    pub fn total_keys(&self) -> u64 {
        self.keys_processed.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let last_candidate_hex = self
            .display
            .lock()
            .map(|d| d.clone())
            .unwrap_or_else(|_| DISPLAY_PLACEHOLDER.to_string());
        ProgressSnapshot {
            total_keys_processed: self.total_keys(),
            last_candidate_hex,
            elapsed: self.elapsed(),
        }
    }
}

/// Render the live status line
pub fn format_status(snapshot: &ProgressSnapshot, found: usize) -> String {
    let hex = &snapshot.last_candidate_hex;
    let tail = hex.get(hex.len().saturating_sub(16)..).unwrap_or(DISPLAY_PLACEHOLDER);
    format!(
        "[RUNNING] Speed: {}/s | Total: {} | Found: {} | {}...",
        format_keys(snapshot.keys_per_second() as u64),
        format_keys(snapshot.total_keys_processed),
        found,
        tail
    )
}

pub fn format_keys(keys: u64) -> String {
    if keys >= 1_000_000_000_000 {
        format!("{:.2}T", keys as f64 / 1e12)
    } else if keys >= 1_000_000_000 {
        format!("{:.2}G", keys as f64 / 1e9)
    } else if keys >= 1_000_000 {
        format!("{:.2}M", keys as f64 / 1e6)
    } else if keys >= 1000 {
        format!("{:.2}K", keys as f64 / 1e3)
    } else {
        format!("{}", keys)
    }
}

pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0s".to_string();
    }
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.0}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.0}m", seconds / 60.0)
    } else if seconds < 86400.0 {
        format!("{:.1}h", seconds / 3600.0)
    } else {
        format!("{:.1}d", seconds / 86400.0)
    }
}
