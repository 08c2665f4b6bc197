use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::{Lsn, INVALID_LSN};

/// LogManager is the write-ahead-log attachment point for the buffer
/// pool. The pool accepts a handle at construction but does not yet
/// invoke it; for now the manager only dispenses log sequence numbers.
pub struct LogManager {
    next_lsn: AtomicU64,
}

impl LogManager {
    pub fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(INVALID_LSN + 1),
        }
    }

    /// Returns the next log sequence number, advancing the counter.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
