//! Cooperative cancellation for document workers
//!
//! The worker checks the token between attempts only. An LLM call already in
//! flight runs to completion and its records are committed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation token shared by every worker of a job
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation; takes effect at the next check
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
