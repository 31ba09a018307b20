//! Keyspace partitioning
//!
//! Splits one scan mode into per-worker plans so that deterministic modes
//! never visit the same key from two workers:
//!
//! - Sequential: worker `i` starts at `start + i` and steps by
//!   `workers * stride`, owning one residue class mod `workers`.
//! - Geometric: seeds are picked greedily so no seed is another seed times a
//!   power of the multiplier; each worker then multiplies.
//! - Random: every worker draws from the same range.

use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::scalar::{clamp_scalar, is_valid_scalar, MAX_SCALAR};

/// How the keyspace is walked for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    /// Linear range attack from `start`
    Sequential { start: U256, stride: u64 },
    /// Uniform draws from `[start, end]`
    Random { start: U256, end: U256 },
    /// `seed, seed*m, seed*m^2, ...` per worker
    Geometric { start: U256, multiplier: u64 },
}

impl ScanMode {
    pub fn name(&self) -> &'static str {
        match self {
            ScanMode::Sequential { .. } => "sequential",
            ScanMode::Random { .. } => "random",
            ScanMode::Geometric { .. } => "geometric",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Sequential { start, stride } => {
                write!(f, "Sequential (start {start}, stride {stride})")
            }
            ScanMode::Random { start, end } => write!(f, "Random ({start} ..= {end})"),
            ScanMode::Geometric { start, multiplier } => {
                write!(f, "Geometric (start {start}, x{multiplier})")
            }
        }
    }
}

/// How a worker moves from one candidate to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceRule {
    Add(U256),
    Multiply(U256),
    Draw { start: U256, end: U256 },
}

impl AdvanceRule {
    /// Next value for deterministic rules.
    ///
    /// `None` once the sequence overflows 256 bits or leaves the keyspace;
    /// both rules only grow, so nothing valid follows. Draw rules have no
    /// successor and also return `None`.
    #[inline]
    pub fn advance(&self, current: U256) -> Option<U256> {
        let next = match self {
            AdvanceRule::Add(step) => current.checked_add(*step)?,
            AdvanceRule::Multiply(factor) => current.checked_mul(*factor)?,
            AdvanceRule::Draw { .. } => return None,
        };
        (next <= MAX_SCALAR).then_some(next)
    }

    pub fn is_random(&self) -> bool {
        matches!(self, AdvanceRule::Draw { .. })
    }
}

/// One worker's share of the keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPlan {
    pub worker_id: usize,
    pub start_value: U256,
    pub advance_rule: AdvanceRule,
}

impl WorkerPlan {
    /// First `limit` values of a deterministic plan.
    pub fn sequence(&self, limit: usize) -> Vec<U256> {
        let mut out = Vec::with_capacity(limit);
        let mut current = Some(self.start_value);
        while let Some(value) = current {
            if out.len() == limit {
                break;
            }
            out.push(value);
            current = self.advance_rule.advance(value);
        }
        out
    }
}

/// A parameter that had to be adjusted to produce an advancing plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionWarning {
    WorkerCountClamped,
    StrideClamped { given: u64 },
    MultiplierClamped { given: u64 },
    StartClamped { given: U256, used: U256 },
    RangeSwapped,
    PlansTruncated { requested: usize, found: usize },
}

impl fmt::Display for PartitionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionWarning::WorkerCountClamped => write!(f, "worker count 0 raised to 1"),
            PartitionWarning::StrideClamped { given } => write!(f, "stride {given} raised to 1"),
            PartitionWarning::MultiplierClamped { given } => {
                write!(f, "multiplier {given} raised to 2")
            }
            PartitionWarning::StartClamped { given, used } => {
                write!(f, "start {given} outside keyspace, using {used}")
            }
            PartitionWarning::RangeSwapped => write!(f, "random range start > end, swapped"),
            PartitionWarning::PlansTruncated { requested, found } => write!(
                f,
                "only {found} of {requested} worker plans fit in the keyspace"
            ),
        }
    }
}

/// Output of [`partition`]
#[derive(Debug, Clone)]
pub struct Partition {
    pub plans: Vec<WorkerPlan>,
    pub warnings: Vec<PartitionWarning>,
}

/// Compute one plan per worker. Pure and deterministic for a given input.
pub fn partition(mode: &ScanMode, workers: usize) -> Partition {
    let mut warnings = Vec::new();
    let workers = if workers == 0 {
        warnings.push(PartitionWarning::WorkerCountClamped);
        1
    } else {
        workers
    };

    let plans: Vec<WorkerPlan> = match *mode {
        ScanMode::Sequential { start, stride } => {
            let stride = if stride == 0 {
                warnings.push(PartitionWarning::StrideClamped { given: stride });
                1
            } else {
                stride
            };
            let start = clamp_start(start, &mut warnings);
            let step = U256::from(workers as u64) * U256::from(stride);

            (0..workers)
                .map_while(|i| {
                    let offset = start.checked_add(U256::from(i as u64))?;
                    is_valid_scalar(&offset).then_some(WorkerPlan {
                        worker_id: i,
                        start_value: offset,
                        advance_rule: AdvanceRule::Add(step),
                    })
                })
                .collect()
        }
        ScanMode::Geometric { start, multiplier } => {
            let multiplier = if multiplier < 2 {
                warnings.push(PartitionWarning::MultiplierClamped { given: multiplier });
                2
            } else {
                multiplier
            };
            let start = clamp_start(start, &mut warnings);
            let factor = U256::from(multiplier);

            geometric_seeds(start, factor, workers)
                .into_iter()
                .enumerate()
                .map(|(i, seed)| WorkerPlan {
                    worker_id: i,
                    start_value: seed,
                    advance_rule: AdvanceRule::Multiply(factor),
                })
                .collect()
        }
        ScanMode::Random { start, end } => {
            let (mut start, mut end) = (clamp_scalar(start), clamp_scalar(end));
            if start > end {
                warnings.push(PartitionWarning::RangeSwapped);
                std::mem::swap(&mut start, &mut end);
            }
            (0..workers)
                .map(|i| WorkerPlan {
                    worker_id: i,
                    start_value: start,
                    advance_rule: AdvanceRule::Draw { start, end },
                })
                .collect()
        }
    };

    if plans.len() < workers {
        warnings.push(PartitionWarning::PlansTruncated {
            requested: workers,
            found: plans.len(),
        });
    }

    Partition { plans, warnings }
}

fn clamp_start(start: U256, warnings: &mut Vec<PartitionWarning>) -> U256 {
    let used = clamp_scalar(start);
    if used != start {
        warnings.push(PartitionWarning::StartClamped { given: start, used });
    }
    used
}

/// Greedily pick `count` seeds from `start, start+1, ...` such that no seed
/// equals another times a power of `multiplier`.
///
/// The search is anchored at `start` rather than at 1, so a starting bit
/// length moves every seed into that range. With `start = 1` this is the
/// plain `1, 2, 3, ...` search.
pub fn geometric_seeds(start: U256, multiplier: U256, count: usize) -> Vec<U256> {
    let mut seeds: Vec<U256> = Vec::with_capacity(count);
    let mut candidate = start;

    while seeds.len() < count && is_valid_scalar(&candidate) {
        if seeds
            .iter()
            .all(|accepted| !is_power_multiple(accepted, &candidate, &multiplier))
        {
            seeds.push(candidate);
        }
        candidate = match candidate.checked_add(U256::one()) {
            Some(next) => next,
            None => break,
        };
    }
    seeds
}

/// `larger == smaller * multiplier^t` for some `t >= 1`
fn is_power_multiple(smaller: &U256, larger: &U256, multiplier: &U256) -> bool {
    if smaller.is_zero() || larger <= smaller || !(*larger % *smaller).is_zero() {
        return false;
    }
    let mut ratio = *larger / *smaller;
    while ratio > U256::one() && (ratio % *multiplier).is_zero() {
        ratio = ratio / *multiplier;
    }
    ratio == U256::one()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_sequential_covers_range_exactly_once() {
        for workers in 1..=8usize {
            for steps in [1usize, 2, 7, 50] {
                let base = 1000u64;
                let part = partition(&ScanMode::Sequential { start: u(base), stride: 1 }, workers);
                assert!(part.warnings.is_empty());
                assert_eq!(part.plans.len(), workers);

                let mut seen = HashSet::new();
                for plan in &part.plans {
                    for value in plan.sequence(steps) {
                        assert!(seen.insert(value), "duplicate {value}");
                    }
                }
                let expected: HashSet<U256> = (0..(workers * steps) as u64)
                    .map(|i| u(base + i))
                    .collect();
                assert_eq!(seen, expected);
            }
        }
    }

    #[test]
    fn test_sequential_stride_scales_step() {
        let part = partition(&ScanMode::Sequential { start: u(1), stride: 3 }, 4);
        assert_eq!(part.plans[2].start_value, u(3));
        assert_eq!(part.plans[2].advance_rule, AdvanceRule::Add(u(12)));
        assert_eq!(part.plans[2].sequence(3), vec![u(3), u(15), u(27)]);
    }

    #[test]
    fn test_degenerate_parameters_are_clamped() {
        let part = partition(&ScanMode::Sequential { start: U256::zero(), stride: 0 }, 0);
        assert_eq!(part.plans.len(), 1);
        assert_eq!(part.plans[0].start_value, u(1));
        assert_eq!(part.plans[0].advance_rule, AdvanceRule::Add(u(1)));
        assert!(part.warnings.contains(&PartitionWarning::WorkerCountClamped));
        assert!(part.warnings.contains(&PartitionWarning::StrideClamped { given: 0 }));

        let part = partition(&ScanMode::Geometric { start: u(1), multiplier: 1 }, 2);
        assert_eq!(part.plans[0].advance_rule, AdvanceRule::Multiply(u(2)));
        assert_eq!(part.warnings, vec![PartitionWarning::MultiplierClamped { given: 1 }]);
    }

    #[test]
    fn test_geometric_seeds_skip_power_multiples() {
        // 2 = 1*2, 4 = 1*2^2 and 6 = 3*2 are rejected
        let seeds = geometric_seeds(u(1), u(2), 4);
        assert_eq!(seeds, vec![u(1), u(3), u(5), u(7)]);

        let seeds = geometric_seeds(u(1), u(3), 4);
        assert_eq!(seeds, vec![u(1), u(2), u(4), u(5)]);
    }

    #[test]
    fn test_geometric_seed_search_anchored_at_start() {
        // 6 = 3*2 is rejected; nothing below the start is considered
        let seeds = geometric_seeds(u(3), u(2), 4);
        assert_eq!(seeds, vec![u(3), u(4), u(5), u(7)]);

        let start = U256::one() << 65usize;
        let seeds = geometric_seeds(start, u(2), 8);
        assert_eq!(seeds.len(), 8);
        assert!(seeds.iter().all(|s| *s >= start));
    }

    #[test]
    fn test_geometric_seed_independence() {
        for multiplier in 2u64..=10 {
            let m = u(multiplier);
            let seeds = geometric_seeds(u(1), m, 64);
            assert_eq!(seeds.len(), 64);
            for (i, a) in seeds.iter().enumerate() {
                for b in seeds.iter().skip(i + 1) {
                    let mut power = *a;
                    while power <= *b {
                        assert_ne!(power, *b, "{b} = {a} * {multiplier}^t");
                        power = power * m;
                    }
                }
            }
        }
    }

    #[test]
    fn test_geometric_sequences_never_collide() {
        let part = partition(&ScanMode::Geometric { start: u(1), multiplier: 2 }, 8);
        let mut seen = HashSet::new();
        for plan in &part.plans {
            for value in plan.sequence(40) {
                assert!(seen.insert(value), "collision at {value}");
            }
        }
    }

    #[test]
    fn test_advance_stops_at_keyspace_end() {
        let rule = AdvanceRule::Add(u(1));
        assert_eq!(rule.advance(MAX_SCALAR), None);
        assert_eq!(AdvanceRule::Multiply(u(2)).advance(U256::MAX), None);
        assert_eq!(rule.advance(u(5)), Some(u(6)));
    }

    #[test]
    fn test_random_plans_share_range() {
        let part = partition(&ScanMode::Random { start: u(100), end: u(10) }, 3);
        assert_eq!(part.warnings, vec![PartitionWarning::RangeSwapped]);
        for plan in &part.plans {
            assert_eq!(plan.advance_rule, AdvanceRule::Draw { start: u(10), end: u(100) });
            assert!(plan.advance_rule.is_random());
        }
    }

    #[test]
    fn test_deterministic() {
        let mode = ScanMode::Geometric { start: u(17), multiplier: 5 };
        assert_eq!(partition(&mode, 6).plans, partition(&mode, 6).plans);
    }
}
