//! RangeScan Core Engine
//!
//! Multi-threaded keyspace search: partitioning, scan workers, discovery
//! ledger, progress and checkpoints.

mod bench;
mod cancel;
mod checkpoint;
mod ledger;
mod partition;
pub mod scalar;
mod search;
mod stats;
mod targets;
mod worker;

pub use bench::{run_benchmark, BenchmarkReport};
pub use cancel::{StopReason, StopToken};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use ledger::{Discovery, DiscoveryLedger, EncodingKind, ReportOutcome};
pub use partition::{
    geometric_seeds, partition, AdvanceRule, Partition, PartitionWarning, ScanMode, WorkerPlan,
};
pub use search::{print_discovery, resume_value, KeySearch, ScanConfig, ScanError, ScanReport};
pub use stats::{format_duration, format_keys, ProgressAggregator, ProgressSnapshot};
pub use targets::{RecordKind, TargetError, TargetIndex, TargetLoad};
pub use worker::{EncodingScan, ScanWorker, WorkerContext, WorkerExit};

// Re-exports for convenience
pub use primitive_types::U256;
pub use rangescan_crypto::{hex, self_test, CryptoError, Hash160};
