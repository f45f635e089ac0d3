//! Progress reporting hook for crawl phases.
//!
//! The orchestrator announces each phase with its unit count and ticks once
//! per settled unit. Rendering (progress bars, plain logs, nothing) is up to
//! the caller.

use std::sync::Arc;

/// Receives crawl progress. Shared across spawned fetch tasks.
pub trait ProgressCallback: Send + Sync {
    /// A phase with `total` units is starting; resets the position.
    fn start_phase(&self, message: String, total: u64);

    /// `delta` more units have settled.
    fn inc(&self, delta: u64);

    /// The job is done.
    fn finish(&self, message: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn start_phase(&self, _message: String, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _message: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
