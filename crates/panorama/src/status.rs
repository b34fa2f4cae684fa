//! Collection sync status tracking and broadcast.
//!
//! A collection's `sync_status` runs `pending → syncing → ready`, with
//! `error` reachable from anywhere. The `syncing → ready` transition fires
//! once every active project has a non-null `last_synced_at`, including the
//! zero-projects case. While syncing, a short-interval polling job
//! re-evaluates the condition and re-schedules itself; it stops silently
//! when the collection is gone or no longer syncing.
//!
//! Broadcasting goes through an injected [`Publisher`]. Status updates carry
//! a rendered display fragment when a renderer is configured; a renderer
//! failure falls back to the structured payload alone rather than losing the
//! update.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::AppContext;
use crate::entity::prelude::*;
use crate::jobs::Job;
use crate::store::{self, StoreError};

/// Delay between collection status re-checks while syncing.
pub const POLL_INTERVAL_SECS: u64 = 10;

/// Aggregate sync progress for a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgressCounts {
    pub synced: u64,
    pub total: u64,
}

impl SyncProgressCounts {
    pub fn complete(&self) -> bool {
        self.synced >= self.total
    }
}

/// Compute `{synced, total}` over a collection's active projects.
pub async fn progress(
    db: &DatabaseConnection,
    collection_id: Uuid,
) -> Result<SyncProgressCounts, StoreError> {
    let total = store::count_collection_projects(db, collection_id).await?;
    let synced = store::count_synced_collection_projects(db, collection_id).await?;
    Ok(SyncProgressCounts { synced, total })
}

/// Re-evaluate a syncing collection, transitioning to `ready` when every
/// project has synced, and broadcast the result.
///
/// Returns the collection's sync status after evaluation, or `None` when the
/// collection no longer exists.
pub async fn check_sync_status(
    ctx: &AppContext,
    collection_id: Uuid,
) -> Result<Option<SyncStatus>, StoreError> {
    let Some(collection) = store::find_collection(&ctx.db, collection_id).await? else {
        return Ok(None);
    };
    if collection.sync_status != SyncStatus::Syncing {
        return Ok(Some(collection.sync_status));
    }

    let counts = progress(&ctx.db, collection_id).await?;
    if counts.complete() {
        let collection =
            store::set_collection_sync_status(&ctx.db, collection, SyncStatus::Ready).await?;
        ctx.broadcaster.broadcast_status(&collection, counts);
        Ok(Some(SyncStatus::Ready))
    } else {
        ctx.broadcaster.broadcast_progress(collection.id, counts);
        Ok(Some(SyncStatus::Syncing))
    }
}

/// One polling-job invocation: check, and re-schedule only while the
/// collection is still syncing. Self-terminating once the collection is
/// missing or in a terminal state.
pub async fn poll_collection(ctx: &AppContext, collection_id: Uuid) -> Result<(), StoreError> {
    match check_sync_status(ctx, collection_id).await? {
        Some(SyncStatus::Syncing) => {
            ctx.queue
                .enqueue_in(
                    Duration::from_secs(POLL_INTERVAL_SECS),
                    Job::CheckCollectionStatus { collection_id },
                )
                .await;
        }
        _ => {
            tracing::debug!(%collection_id, "collection poll finished");
        }
    }
    Ok(())
}

// ─── Broadcast ───────────────────────────────────────────────────────────────

/// Event kinds pushed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastKind {
    StatusUpdate,
    ProgressUpdate,
    Test,
}

/// Fire-and-forget realtime channel. Delivery needs no ack.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: serde_json::Value);
}

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Renders a display fragment for a collection status update. May fail; the
/// broadcaster falls back to structured data alone.
pub trait StatusRenderer: Send + Sync {
    fn render(
        &self,
        collection: &CollectionModel,
        counts: SyncProgressCounts,
    ) -> Result<String, RenderError>;
}

/// Plain-text renderer used by the CLI and as a sensible default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl StatusRenderer for PlainTextRenderer {
    fn render(
        &self,
        collection: &CollectionModel,
        counts: SyncProgressCounts,
    ) -> Result<String, RenderError> {
        Ok(format!(
            "{}: import {}, sync {} ({} of {} projects synced)",
            collection.name,
            collection.import_status,
            collection.sync_status,
            counts.synced,
            counts.total
        ))
    }
}

/// Pushes structured status events to collection- and project-scoped topics.
#[derive(Clone)]
pub struct Broadcaster {
    publisher: Arc<dyn Publisher>,
    renderer: Option<Arc<dyn StatusRenderer>>,
}

impl Broadcaster {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            renderer: None,
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn StatusRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn collection_topic(collection_id: Uuid) -> String {
        format!("collections:{collection_id}")
    }

    pub fn project_topic(project_id: Uuid) -> String {
        format!("projects:{project_id}")
    }

    /// Project-scoped sync status push, for dashboards watching one project.
    pub fn broadcast_project_status(&self, project_id: Uuid, status: &SyncStatus) {
        let payload = serde_json::json!({
            "kind": BroadcastKind::StatusUpdate,
            "sync_status": status,
        });
        self.publisher
            .publish(&Self::project_topic(project_id), payload);
    }

    /// Full status update, with a rendered fragment when rendering succeeds.
    pub fn broadcast_status(&self, collection: &CollectionModel, counts: SyncProgressCounts) {
        let fragment = match &self.renderer {
            Some(renderer) => match renderer.render(collection, counts) {
                Ok(html) => Some(html),
                Err(e) => {
                    tracing::warn!(collection = %collection.slug, error = %e,
                        "status render failed, broadcasting without fragment");
                    None
                }
            },
            None => None,
        };

        self.publish_event(
            collection.id,
            BroadcastKind::StatusUpdate,
            &collection.import_status,
            &collection.sync_status,
            counts,
            fragment,
        );
    }

    /// Lightweight progress counter update.
    pub fn broadcast_progress(&self, collection_id: Uuid, counts: SyncProgressCounts) {
        let payload = serde_json::json!({
            "kind": BroadcastKind::ProgressUpdate,
            "progress": counts,
        });
        self.publisher
            .publish(&Self::collection_topic(collection_id), payload);
    }

    /// Error-state update after a failed import.
    pub fn broadcast_error(&self, collection: &CollectionModel, counts: SyncProgressCounts) {
        self.publish_event(
            collection.id,
            BroadcastKind::StatusUpdate,
            &collection.import_status,
            &collection.sync_status,
            counts,
            None,
        );
    }

    fn publish_event(
        &self,
        collection_id: Uuid,
        kind: BroadcastKind,
        import_status: &ImportStatus,
        sync_status: &SyncStatus,
        counts: SyncProgressCounts,
        fragment: Option<String>,
    ) {
        let mut payload = serde_json::json!({
            "kind": kind,
            "import_status": import_status,
            "sync_status": sync_status,
            "progress": counts,
        });
        if let Some(html) = fragment {
            payload["html"] = serde_json::Value::String(html);
        }
        self.publisher
            .publish(&Self::collection_topic(collection_id), payload);
    }
}

/// Publisher that records events in memory. Used by tests and the CLI's
/// verbose mode.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic.to_string(), payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_collection() -> CollectionModel {
        CollectionModel {
            id: Uuid::new_v4(),
            slug: "tools".to_string(),
            name: "Tools".to_string(),
            github_organization_url: None,
            collective_url: None,
            repository_url: None,
            dependency_file: Some("{}".to_string()),
            import_status: ImportStatus::Completed,
            sync_status: SyncStatus::Syncing,
            last_error_message: None,
            last_error_backtrace: None,
            last_errored_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    struct FailingRenderer;

    impl StatusRenderer for FailingRenderer {
        fn render(
            &self,
            _collection: &CollectionModel,
            _counts: SyncProgressCounts,
        ) -> Result<String, RenderError> {
            Err(RenderError("template blew up".to_string()))
        }
    }

    #[test]
    fn status_broadcast_includes_rendered_fragment() {
        let publisher = Arc::new(MemoryPublisher::new());
        let broadcaster = Broadcaster::new(publisher.clone())
            .with_renderer(Arc::new(PlainTextRenderer));
        let collection = make_collection();

        broadcaster.broadcast_status(&collection, SyncProgressCounts { synced: 3, total: 5 });

        let events = publisher.events();
        assert_eq!(events.len(), 1);
        let (topic, payload) = &events[0];
        assert_eq!(*topic, Broadcaster::collection_topic(collection.id));
        assert_eq!(payload["kind"], "status_update");
        assert_eq!(payload["progress"]["synced"], 3);
        assert!(payload["html"].as_str().is_some_and(|h| h.contains("3 of 5")));
    }

    #[test]
    fn render_failure_falls_back_to_structured_payload() {
        let publisher = Arc::new(MemoryPublisher::new());
        let broadcaster =
            Broadcaster::new(publisher.clone()).with_renderer(Arc::new(FailingRenderer));
        let collection = make_collection();

        broadcaster.broadcast_status(&collection, SyncProgressCounts { synced: 1, total: 2 });

        let events = publisher.events();
        assert_eq!(events.len(), 1);
        let payload = &events[0].1;
        assert!(payload.get("html").is_none());
        assert_eq!(payload["sync_status"], "syncing");
    }

    #[test]
    fn progress_counts_complete_covers_the_zero_project_case() {
        assert!(SyncProgressCounts { synced: 0, total: 0 }.complete());
        assert!(!SyncProgressCounts { synced: 3, total: 5 }.complete());
    }
}
