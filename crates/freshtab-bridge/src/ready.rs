//! Load sequencing for the frame-ready guard.
//!
//! The frame may navigate again while a ready-handler for an earlier load
//! is still pending. Each load request is tagged with a monotonically
//! increasing sequence number; ready-callbacks whose sequence is no longer
//! current are discarded, so a fast navigate-away-and-back can never
//! deliver messages into the wrong document.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadSeq(u64);

/// Issues and checks load sequence numbers.
pub struct LoadTracker {
    current: AtomicU64,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Start a new load, invalidating all earlier sequence numbers.
    pub fn begin_load(&self) -> LoadSeq {
        LoadSeq(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn current(&self) -> LoadSeq {
        LoadSeq(self.current.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, seq: LoadSeq) -> bool {
        seq == self.current()
    }
}

impl Default for LoadTracker {
    fn default() -> Self {
        Self::new()
    }
}
