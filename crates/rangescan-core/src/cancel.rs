//! Cooperative stop signal shared by the supervisor and its workers

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Interrupted by the user (Ctrl-C)
    Interrupted,
    /// A discovery was recorded and stop-on-find is enabled
    Found,
    /// Configured key or time limit reached
    Limit,
    /// Every worker ran off the end of the keyspace
    Exhausted,
}

impl StopReason {
    fn code(self) -> u8 {
        match self {
            StopReason::Interrupted => 1,
            StopReason::Found => 2,
            StopReason::Limit => 3,
            StopReason::Exhausted => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StopReason::Interrupted),
            2 => Some(StopReason::Found),
            3 => Some(StopReason::Limit),
            4 => Some(StopReason::Exhausted),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    reason: AtomicU8,
}

/// Clonable cancellation token. The first `stop` call wins the reason.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` if this call set the reason.
    pub fn stop(&self, reason: StopReason) -> bool {
        let won = self
            .inner
            .reason
            .compare_exchange(0, reason.code(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        self.inner.stopped.store(true, Ordering::SeqCst);
        won
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Relaxed)
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_code(self.inner.reason.load(Ordering::SeqCst))
    }
}
