//! Per-worker scan loop
//!
//! Each worker walks its own plan in batches. Shared state is only touched
//! at batch boundaries (progress, stop flag, display) or on a match (ledger).

use std::sync::Arc;
use std::time::{Duration, Instant};

use primitive_types::U256;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rangescan_crypto::Secp256k1Keypair;

use crate::cancel::{StopReason, StopToken};
use crate::ledger::{DiscoveryLedger, EncodingKind, ReportOutcome};
use crate::partition::{AdvanceRule, WorkerPlan};
use crate::scalar::{is_valid_scalar, to_hex64, write_be_bytes};
use crate::stats::ProgressAggregator;
use crate::targets::TargetIndex;

/// Minimum gap between display updates from the designated worker
const DISPLAY_INTERVAL: Duration = Duration::from_millis(200);

/// Which public-key encodings are hashed per candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingScan {
    CompressedOnly,
    UncompressedOnly,
    Both,
}

impl EncodingScan {
    #[inline]
    pub fn compressed(self) -> bool {
        matches!(self, EncodingScan::CompressedOnly | EncodingScan::Both)
    }

    #[inline]
    pub fn uncompressed(self) -> bool {
        matches!(self, EncodingScan::UncompressedOnly | EncodingScan::Both)
    }

    /// Keys hashed per candidate
    pub fn hashes_per_key(self) -> u64 {
        if self == EncodingScan::Both {
            2
        } else {
            1
        }
    }
}

/// How a worker's loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerExit {
    /// Stop requested externally (interrupt or limit)
    StoppedBySignal,
    /// A discovery was recorded somewhere and stop-on-find is set
    StoppedOnFirstFind,
    /// The plan ran past the end of the keyspace
    Exhausted,
}

/// Handles shared by every worker of a run
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub targets: Arc<TargetIndex>,
    pub ledger: Arc<DiscoveryLedger>,
    pub progress: Arc<ProgressAggregator>,
    pub stop: StopToken,
    pub encodings: EncodingScan,
    pub batch_size: usize,
    pub stop_on_find: bool,
    /// 0 = unlimited
    pub max_keys: u64,
    pub max_time: Option<Duration>,
}

enum Check {
    Miss,
    Invalid,
    Recorded,
}

/// One worker executing one plan
pub struct ScanWorker<'a> {
    plan: WorkerPlan,
    ctx: &'a WorkerContext,
}

impl<'a> ScanWorker<'a> {
    pub fn new(plan: WorkerPlan, ctx: &'a WorkerContext) -> Self {
        Self { plan, ctx }
    }

    /// Run until stopped or exhausted.
    pub fn run(&self) -> WorkerExit {
        let ctx = self.ctx;
        let id = self.plan.worker_id;
        let rule = self.plan.advance_rule;
        let batch_size = ctx.batch_size.max(1);
        let shows_display = id == 0;

        let mut rng = rand::thread_rng();
        let mut key_bytes = [0u8; 32];
        let mut current = Some(self.plan.start_value);
        let mut last_candidate = self.plan.start_value;
        let mut steps: u64 = 0;
        let mut last_display: Option<Instant> = None;

        debug!(worker = id, start = %self.plan.start_value, "worker started");

        loop {
            if let Some(exit) = self.should_stop() {
                debug!(worker = id, ?exit, steps, "worker stopping");
                return exit;
            }

            let mut processed: u64 = 0;
            let mut exit = None;

            for _ in 0..batch_size {
                let candidate = match rule {
                    AdvanceRule::Draw { start, end } => draw_uniform(&mut rng, start, end),
                    _ => match current {
                        Some(value) => value,
                        None => {
                            exit = Some(WorkerExit::Exhausted);
                            break;
                        }
                    },
                };

                processed += 1;
                last_candidate = candidate;
                let outcome = self.check(&candidate, &mut key_bytes);

                if !rule.is_random() {
                    steps += 1;
                    current = rule.advance(candidate);
                }

                if let Check::Recorded = outcome {
                    if ctx.stop_on_find {
                        ctx.stop.stop(StopReason::Found);
                        exit = Some(WorkerExit::StoppedOnFirstFind);
                        break;
                    }
                }
            }

            ctx.progress.add(processed);
            if !rule.is_random() {
                ctx.progress.record_steps(id, steps);
            }

            if shows_display && last_display.map_or(true, |t| t.elapsed() >= DISPLAY_INTERVAL) {
                ctx.progress.set_display(to_hex64(&last_candidate));
                last_display = Some(Instant::now());
            }

            if let Some(exit) = exit {
                debug!(worker = id, ?exit, steps, "worker finished");
                return exit;
            }
        }
    }

    fn should_stop(&self) -> Option<WorkerExit> {
        let ctx = self.ctx;
        if !ctx.stop.is_stopped() {
            let over_keys = ctx.max_keys > 0 && ctx.progress.total_keys() >= ctx.max_keys;
            let over_time = ctx.max_time.is_some_and(|t| ctx.progress.elapsed() >= t);
            if !(over_keys || over_time) {
                return None;
            }
            ctx.stop.stop(StopReason::Limit);
        }
        match ctx.stop.reason() {
            Some(StopReason::Found) => Some(WorkerExit::StoppedOnFirstFind),
            _ => Some(WorkerExit::StoppedBySignal),
        }
    }

    /// Derive, hash and look up one candidate. No heap allocation unless it matches.
    #[inline]
    fn check(&self, candidate: &U256, key_bytes: &mut [u8; 32]) -> Check {
        if !is_valid_scalar(candidate) {
            return Check::Invalid;
        }
        write_be_bytes(candidate, key_bytes);
        let Ok(keypair) = Secp256k1Keypair::from_bytes(key_bytes) else {
            return Check::Invalid;
        };

        let ctx = self.ctx;
        let mut result = Check::Miss;

        if ctx.encodings.compressed() {
            let fingerprint = keypair.fingerprint_compressed();
            if ctx.targets.contains(&fingerprint)
                && ctx.ledger.report(candidate, &fingerprint, EncodingKind::Compressed)
                    == ReportOutcome::Recorded
            {
                result = Check::Recorded;
            }
        }

        if ctx.encodings.uncompressed() {
            let fingerprint = keypair.fingerprint_uncompressed();
            if ctx.targets.contains(&fingerprint)
                && ctx.ledger.report(candidate, &fingerprint, EncodingKind::Uncompressed)
                    == ReportOutcome::Recorded
            {
                result = Check::Recorded;
            }
        }

        result
    }
}

/// Uniform draw from `[start, end]` by rejection sampling on the span's bit width.
pub fn draw_uniform<R: RngCore>(rng: &mut R, start: U256, end: U256) -> U256 {
    if end <= start {
        return start;
    }
    let span = end - start;
    let shift = 256 - span.bits();
    let mut buf = [0u8; 32];
    loop {
        rng.fill_bytes(&mut buf);
        let offset = U256::from_big_endian(&buf) >> shift;
        if offset <= span {
            return start + offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{partition, ScanMode};
    use rangescan_crypto::Hash160;
    use std::collections::HashSet;

    fn fingerprint_of(key: u64) -> Hash160 {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&key.to_be_bytes());
        Secp256k1Keypair::from_bytes(&bytes).unwrap().fingerprint_compressed()
    }

    fn context(targets: TargetIndex, workers: usize) -> WorkerContext {
        WorkerContext {
            targets: Arc::new(targets),
            ledger: Arc::new(DiscoveryLedger::new(None, None)),
            progress: ProgressAggregator::new(workers),
            stop: StopToken::new(),
            encodings: EncodingScan::CompressedOnly,
            batch_size: 100,
            stop_on_find: true,
            max_keys: 0,
            max_time: None,
        }
    }

    #[test]
    fn test_finds_key_in_own_residue_class() {
        let target = 37u64;
        let ctx = context(TargetIndex::from_iter([fingerprint_of(target)]), 4);
        let part = partition(&ScanMode::Sequential { start: U256::from(10u64), stride: 1 }, 4);

        // 37 = 10 + 3 + 4*6, owned by worker 3
        let owner = &part.plans[3];
        assert_eq!(ScanWorker::new(*owner, &ctx).run(), WorkerExit::StoppedOnFirstFind);
        assert_eq!(ctx.ledger.len(), 1);
        assert_eq!(ctx.stop.reason(), Some(StopReason::Found));
        assert_eq!(ctx.progress.total_keys(), 7);

        // Other workers observe the stop at their first batch boundary
        let other = ScanWorker::new(part.plans[0], &ctx).run();
        assert_eq!(other, WorkerExit::StoppedOnFirstFind);
    }

    #[test]
    fn test_continues_after_find_without_stop_on_find() {
        let mut ctx = context(
            TargetIndex::from_iter([fingerprint_of(3), fingerprint_of(5)]),
            1,
        );
        ctx.stop_on_find = false;
        ctx.max_keys = 200;
        let part = partition(&ScanMode::Sequential { start: U256::one(), stride: 1 }, 1);

        assert_eq!(ScanWorker::new(part.plans[0], &ctx).run(), WorkerExit::StoppedBySignal);
        assert_eq!(ctx.ledger.len(), 2);
        assert_eq!(ctx.stop.reason(), Some(StopReason::Limit));
        assert_eq!(ctx.progress.total_keys(), 200);
        assert_eq!(ctx.progress.min_steps(), 200);
    }

    #[test]
    fn test_exhausts_at_keyspace_end() {
        let ctx = context(TargetIndex::default(), 1);
        let start = crate::scalar::MAX_SCALAR - U256::from(4u64);
        let part = partition(&ScanMode::Sequential { start, stride: 1 }, 1);

        assert_eq!(ScanWorker::new(part.plans[0], &ctx).run(), WorkerExit::Exhausted);
        assert_eq!(ctx.progress.total_keys(), 5);
        assert!(!ctx.stop.is_stopped());
    }

    #[test]
    fn test_uncompressed_only_ignores_compressed_target() {
        let mut ctx = context(TargetIndex::from_iter([fingerprint_of(2)]), 1);
        ctx.encodings = EncodingScan::UncompressedOnly;
        ctx.max_keys = 100;
        let part = partition(&ScanMode::Sequential { start: U256::one(), stride: 1 }, 1);

        assert_eq!(ScanWorker::new(part.plans[0], &ctx).run(), WorkerExit::StoppedBySignal);
        assert!(ctx.ledger.is_empty());
    }

    #[test]
    fn test_geometric_worker_hits_power() {
        let ctx = context(TargetIndex::from_iter([fingerprint_of(3 * 1024)]), 2);
        let part = partition(&ScanMode::Geometric { start: U256::one(), multiplier: 2 }, 2);
        assert_eq!(part.plans[1].start_value, U256::from(3u64));

        assert_eq!(ScanWorker::new(part.plans[1], &ctx).run(), WorkerExit::StoppedOnFirstFind);
        assert_eq!(ctx.progress.total_keys(), 11);
    }

    #[test]
    fn test_random_worker_finds_in_small_range() {
        let mut ctx = context(TargetIndex::from_iter([fingerprint_of(21)]), 1);
        ctx.batch_size = 50;
        ctx.max_keys = 100_000;
        let part = partition(
            &ScanMode::Random { start: U256::from(16u64), end: U256::from(23u64) },
            1,
        );

        assert_eq!(ScanWorker::new(part.plans[0], &ctx).run(), WorkerExit::StoppedOnFirstFind);
        assert_eq!(ctx.ledger.len(), 1);
    }

    #[test]
    fn test_draw_uniform_stays_in_range() {
        let mut rng = rand::thread_rng();
        let (start, end) = (U256::from(100u64), U256::from(103u64));
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let v = draw_uniform(&mut rng, start, end);
            assert!(v >= start && v <= end);
            seen.insert(v);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(draw_uniform(&mut rng, start, start), start);

        let wide = draw_uniform(&mut rng, U256::one(), crate::scalar::MAX_SCALAR);
        assert!(is_valid_scalar(&wide));
    }
}
