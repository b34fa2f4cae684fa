//! Background job types and the work-queue seam.
//!
//! The queue itself is an external collaborator; the core only needs
//! `enqueue` and delayed `enqueue_in` with at-least-once delivery. Every job
//! handler is idempotent against redelivery.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::AppContext;
use crate::import::ImportError;
use crate::store::StoreError;
use crate::sync::SyncOptions;
use crate::{import, status, sync};

/// One unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    SyncProject { project_id: Uuid },
    ImportCollection { collection_id: Uuid },
    CheckCollectionStatus { collection_id: Uuid },
}

/// Work-queue interface. Delivery is fire-and-forget from the caller's view;
/// implementations log their own failures.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job);
    async fn enqueue_in(&self, delay: Duration, job: Job);
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Execute one job against the context.
pub async fn run_job(ctx: &AppContext, job: Job) -> Result<(), JobError> {
    match job {
        Job::SyncProject { project_id } => {
            let options = SyncOptions {
                force: false,
                job_id: Some(Uuid::new_v4()),
            };
            sync::sync_project(ctx, project_id, &options, None).await?;
            Ok(())
        }
        Job::ImportCollection { collection_id } => {
            import::import_collection(ctx, collection_id).await?;
            Ok(())
        }
        Job::CheckCollectionStatus { collection_id } => {
            status::poll_collection(ctx, collection_id).await?;
            Ok(())
        }
    }
}

/// In-process queue used by tests and the CLI's inline runner. Delays are
/// recorded but not waited on; jobs come back out in FIFO order.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    jobs: Mutex<VecDeque<(Option<Duration>, Job)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of queued jobs with their requested delays.
    pub fn queued(&self) -> Vec<(Option<Duration>, Job)> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((None, job));
    }

    async fn enqueue_in(&self, delay: Duration, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((Some(delay), job));
    }
}
