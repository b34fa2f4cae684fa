use panorama::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::Started { url } => {
                tracing::info!(url = %url, "Syncing project");
            }
            SyncProgress::Fresh => {
                tracing::info!("Project synced recently, nothing to do");
            }
            SyncProgress::StepCompleted { step, count } => {
                tracing::info!(step, count, "Step completed");
            }
            SyncProgress::StepFailed { step, message } => {
                tracing::warn!(step, error = %message, "Step failed, continuing");
            }
            SyncProgress::SkippedLowValueFork => {
                tracing::info!("Low-value fork, skipped deep resource sync");
            }
            SyncProgress::Completed => {
                tracing::info!("Sync complete");
            }
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
