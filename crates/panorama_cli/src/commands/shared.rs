//! Context construction shared by the CLI commands.
//!
//! The CLI runs jobs inline: operations enqueue onto an in-memory queue and
//! the command drains it to completion before exiting. Broadcast events are
//! logged instead of being pushed to a realtime channel.

use std::sync::Arc;

use panorama::context::AppContext;
use panorama::gateway::ApiGateway;
use panorama::http::ReqwestTransport;
use panorama::jobs::{self, InMemoryQueue, Job};
use panorama::status::{Broadcaster, PlainTextRenderer, Publisher};

use crate::config::Config;

/// Publisher that logs broadcast events; the CLI has no live subscribers.
pub(crate) struct LoggingPublisher;

impl Publisher for LoggingPublisher {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        tracing::debug!(topic, %payload, "broadcast");
    }
}

pub(crate) struct CliRuntime {
    pub ctx: AppContext,
    pub queue: Arc<InMemoryQueue>,
}

/// Connect (running migrations) and assemble the application context.
pub(crate) async fn build_runtime(
    config: &Config,
    database_url: &str,
) -> Result<CliRuntime, Box<dyn std::error::Error>> {
    let db = panorama::connect_and_migrate(database_url).await?;

    let transport = Arc::new(ReqwestTransport::with_defaults()?);
    let gateway = ApiGateway::new(transport);

    let queue = Arc::new(InMemoryQueue::new());
    let broadcaster =
        Broadcaster::new(Arc::new(LoggingPublisher)).with_renderer(Arc::new(PlainTextRenderer));

    let ctx = AppContext::new(db, gateway, queue.clone(), broadcaster)
        .with_upstream(config.upstream());

    Ok(CliRuntime { ctx, queue })
}

/// Run queued jobs inline until the queue is empty. Job failures are logged
/// and do not stop the remaining jobs.
///
/// Status polls re-enqueue themselves while their collection is syncing. A
/// poll that comes around again with no other work executed in between
/// cannot observe new progress inline, so it is dropped instead of re-run;
/// otherwise a collection with a failed project sync would spin the drain
/// loop forever.
pub(crate) async fn drain_jobs(runtime: &CliRuntime) {
    let mut ran_polls: Vec<Job> = Vec::new();
    while let Some(job) = runtime.queue.pop() {
        match &job {
            Job::CheckCollectionStatus { .. } => {
                if ran_polls.contains(&job) {
                    tracing::warn!(?job, "collection still syncing with no work left, stopping re-checks");
                    continue;
                }
                ran_polls.push(job.clone());
            }
            _ => ran_polls.clear(),
        }
        if let Err(e) = jobs::run_job(&runtime.ctx, job.clone()).await {
            tracing::error!(?job, error = %e, "job failed");
        }
    }
}
