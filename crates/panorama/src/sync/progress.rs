//! Progress reporting for sync runs.
//!
//! Callers can observe each step of a sync by providing a callback. The
//! engine emits events at step boundaries; callbacks must be cheap and must
//! not block.

/// A progress event emitted during a sync run.
#[derive(Debug, Clone)]
pub enum SyncProgress {
    /// The run started for the given project URL.
    Started { url: String },
    /// Project was synced within the freshness window; run is a no-op.
    Fresh,
    /// A step finished, with the number of records it touched.
    StepCompleted { step: &'static str, count: usize },
    /// A step failed softly; later steps still run.
    StepFailed { step: &'static str, message: String },
    /// Deep resource sync skipped for a low-value fork.
    SkippedLowValueFork,
    /// The run finished.
    Completed,
}

/// Callback invoked with progress events.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

pub(crate) fn emit(callback: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}
