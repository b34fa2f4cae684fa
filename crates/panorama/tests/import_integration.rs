//! Integration tests for the collection import orchestrator and the status
//! tracker, against an in-memory SQLite database and a mock HTTP transport.
//!
//! Key scenarios:
//! - Each import source (organization, collective, repository, dependency
//!   file) enumerates, registers, and schedules correctly
//! - A zero-project collection is ready immediately after import
//! - A malformed dependency file marks the collection errored and re-raises
//! - Re-importing an errored collection resets its sync status first
//! - Soft-deleted collection links are restored, never duplicated
//! - GitHub PURLs resolve without a remote package lookup
//! - The status poller self-terminates

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use panorama::context::AppContext;
use panorama::entity::prelude::*;
use panorama::gateway::ApiGateway;
use panorama::http::MockTransport;
use panorama::import;
use panorama::jobs::{InMemoryQueue, Job};
use panorama::status::{self, Broadcaster, MemoryPublisher, POLL_INTERVAL_SECS};
use panorama::store::{self, NewCollection};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, IntoActiveModel, PaginatorTrait};
use serde_json::json;
use uuid::Uuid;

struct TestApp {
    ctx: AppContext,
    transport: MockTransport,
    queue: Arc<InMemoryQueue>,
    publisher: Arc<MemoryPublisher>,
}

async fn setup() -> TestApp {
    let db = panorama::connect_and_migrate("sqlite::memory:")
        .await
        .expect("in-memory database should migrate");

    let transport = MockTransport::new();
    let gateway = ApiGateway::new(Arc::new(transport.clone()));
    let queue = Arc::new(InMemoryQueue::new());
    let publisher = Arc::new(MemoryPublisher::new());
    let broadcaster = Broadcaster::new(publisher.clone());

    TestApp {
        ctx: AppContext::new(db, gateway, queue.clone(), broadcaster),
        transport,
        queue,
        publisher,
    }
}

async fn make_collection(app: &TestApp, new: NewCollection) -> CollectionModel {
    store::create_collection(&app.ctx.db, new)
        .await
        .expect("create collection")
}

async fn reload(app: &TestApp, id: Uuid) -> CollectionModel {
    store::find_collection(&app.ctx.db, id)
        .await
        .expect("reload collection")
        .expect("collection exists")
}

// ─── Import sources ──────────────────────────────────────────────────────────

#[tokio::test]
async fn organization_import_registers_schedules_and_polls() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "rails-org".to_string(),
            name: "Rails".to_string(),
            github_organization_url: Some("https://github.com/rails".to_string()),
            ..Default::default()
        },
    )
    .await;

    app.transport.push_json(
        app.ctx.upstream.organization_repositories("rails", 1),
        json!([
            {"full_name": "rails/rails", "html_url": "https://github.com/rails/rails"},
            {"full_name": "rails/arel"},
        ]),
    );

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.registered, 2);
    assert_eq!(summary.scheduled, 2, "never-synced projects get sync jobs");

    // Both URLs registered; the name-only entry falls back to a github.com URL.
    assert!(
        store::find_project_by_url(&app.ctx.db, "https://github.com/rails/arel")
            .await
            .expect("query")
            .is_some()
    );

    // Two sync jobs, then the delayed status poll (still syncing).
    let queued = app.queue.queued();
    assert_eq!(queued.len(), 3);
    assert!(matches!(queued[0], (None, Job::SyncProject { .. })));
    assert!(matches!(queued[1], (None, Job::SyncProject { .. })));
    assert_eq!(
        queued[2],
        (
            Some(Duration::from_secs(POLL_INTERVAL_SECS)),
            Job::CheckCollectionStatus {
                collection_id: collection.id
            }
        )
    );

    let collection = reload(&app, collection.id).await;
    assert_eq!(collection.import_status, ImportStatus::Completed);
    assert_eq!(collection.sync_status, SyncStatus::Syncing);

    // One progress broadcast per registration, plus the status updates.
    let progress_events = app
        .publisher
        .events()
        .iter()
        .filter(|(_, payload)| payload["kind"] == "progress_update")
        .count();
    assert!(progress_events >= 2, "per-registration progress broadcasts");
}

#[tokio::test]
async fn collective_import_registers_tracked_projects() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "rails-collective".to_string(),
            name: "Rails Collective".to_string(),
            collective_url: Some("https://opencollective.com/rails".to_string()),
            ..Default::default()
        },
    )
    .await;

    app.transport.push_json(
        app.ctx
            .upstream
            .collective_projects("https://opencollective.com/rails"),
        json!({
            "url": "https://opencollective.com/rails",
            "projects": [
                {"repository_url": "https://github.com/rails/rails"},
                {"url": "https://github.com/rails/rails"},
            ],
        }),
    );

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    // The two entries normalize to the same URL and are deduplicated.
    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.registered, 1);
}

#[tokio::test]
async fn repository_import_expands_through_its_sbom() {
    let app = setup().await;
    let repo_url = "https://github.com/rails/rails";
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "rails-repo".to_string(),
            name: "Rails Repo".to_string(),
            repository_url: Some(repo_url.to_string()),
            ..Default::default()
        },
    )
    .await;

    app.transport.push_json(
        app.ctx.upstream.repository_sbom(repo_url),
        json!({
            "bomFormat": "CycloneDX",
            "components": [{"purl": "pkg:github/rails/thor@v1.3.0"}],
        }),
    );

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    // The repository itself plus its SBOM-resolved dependency.
    assert_eq!(summary.discovered, 2);
    assert!(
        store::find_project_by_url(&app.ctx.db, "https://github.com/rails/thor")
            .await
            .expect("query")
            .is_some()
    );
}

#[tokio::test]
async fn dependency_file_import_persists_the_document() {
    let app = setup().await;
    let raw = json!({
        "bomFormat": "CycloneDX",
        "components": [{"purl": "pkg:github/tokio-rs/tokio@v1.38.0"}],
    })
    .to_string();

    let collection = make_collection(
        &app,
        NewCollection {
            slug: "deps".to_string(),
            name: "Dependencies".to_string(),
            dependency_file: Some(raw),
            ..Default::default()
        },
    )
    .await;

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    assert_eq!(summary.discovered, 1);

    let sboms = Sbom::find()
        .all(&app.ctx.db)
        .await
        .expect("query sboms");
    assert_eq!(sboms.len(), 1);
    assert_eq!(sboms[0].collection_id, collection.id);
    assert!(sboms[0].converted.is_some(), "parsed form kept alongside raw");
}

// ─── PURL resolution ─────────────────────────────────────────────────────────

#[tokio::test]
async fn github_purls_resolve_without_a_remote_package_lookup() {
    let app = setup().await;
    let raw = json!({
        "bomFormat": "CycloneDX",
        "components": [{"purl": "pkg:github/tokio-rs/tokio@v1.38.0"}],
    })
    .to_string();

    let collection = make_collection(
        &app,
        NewCollection {
            slug: "gh-only".to_string(),
            name: "GitHub Only".to_string(),
            dependency_file: Some(raw),
            ..Default::default()
        },
    )
    .await;

    import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    assert!(
        app.transport.requests().is_empty(),
        "a github PURL maps to a URL directly"
    );
    assert!(
        store::find_project_by_url(&app.ctx.db, "https://github.com/tokio-rs/tokio")
            .await
            .expect("query")
            .is_some()
    );
}

#[tokio::test]
async fn unresolvable_purls_are_skipped_not_fatal() {
    let app = setup().await;
    let raw = json!({
        "bomFormat": "CycloneDX",
        "components": [
            {"purl": "pkg:npm/left-pad@1.3.0"},
            {"purl": "pkg:github/rails/rails@v7.0.0"},
        ],
    })
    .to_string();

    let collection = make_collection(
        &app,
        NewCollection {
            slug: "mixed".to_string(),
            name: "Mixed".to_string(),
            dependency_file: Some(raw),
            ..Default::default()
        },
    )
    .await;

    // The registry has never heard of the npm package.
    app.transport.push_status(
        app.ctx.upstream.package_lookup("pkg:npm/left-pad@1.3.0"),
        404,
    );

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");

    assert_eq!(summary.discovered, 1, "only the resolvable PURL remains");
    let collection = reload(&app, collection.id).await;
    assert_eq!(collection.import_status, ImportStatus::Completed);
}

// ─── Failure handling ────────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_dependency_file_marks_the_collection_errored() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "broken".to_string(),
            name: "Broken".to_string(),
            dependency_file: Some("this is not an SBOM".to_string()),
            ..Default::default()
        },
    )
    .await;

    let err = import::import_collection(&app.ctx, collection.id)
        .await
        .expect_err("malformed document must fail the import");
    assert!(
        err.to_string().contains("Invalid SBOM file format"),
        "unexpected error: {err}"
    );

    let collection = reload(&app, collection.id).await;
    assert_eq!(collection.import_status, ImportStatus::Error);
    assert_eq!(collection.sync_status, SyncStatus::Error);
    assert!(
        collection
            .last_error_message
            .as_deref()
            .is_some_and(|m| m.contains("Invalid SBOM file format"))
    );
    assert!(collection.last_error_backtrace.is_some());
    assert!(collection.last_errored_at.is_some());

    // The error state was pushed to subscribers.
    assert!(
        app.publisher
            .events()
            .iter()
            .any(|(_, payload)| payload["import_status"] == "error")
    );
}

#[tokio::test]
async fn reimporting_an_errored_collection_resets_the_sync_status() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "retry".to_string(),
            name: "Retry".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let collection =
        store::record_import_error(&app.ctx.db, collection, "upstream exploded", None)
            .await
            .expect("record error");
    assert_eq!(collection.sync_status, SyncStatus::Error);

    let collection = store::begin_import(&app.ctx.db, collection)
        .await
        .expect("begin import");

    // Enumeration must not run under the stale error state.
    assert_eq!(collection.import_status, ImportStatus::Importing);
    assert_eq!(collection.sync_status, SyncStatus::Pending);
}

#[tokio::test]
async fn collection_creation_without_a_source_is_rejected() {
    let app = setup().await;
    let err = store::create_collection(
        &app.ctx.db,
        NewCollection {
            slug: "no-source".to_string(),
            name: "No Source".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect_err("a collection needs an import source");
    assert!(matches!(err, store::StoreError::InvalidInput(_)), "{err}");
}

// ─── Membership links ────────────────────────────────────────────────────────

#[tokio::test]
async fn readding_a_removed_project_restores_the_same_link_row() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "tools".to_string(),
            name: "Tools".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let project = store::find_or_create_project(&app.ctx.db, "https://github.com/rails/rails")
        .await
        .expect("create project");

    let original = store::add_project_to_collection(&app.ctx.db, collection.id, project.id)
        .await
        .expect("add");
    store::remove_project_from_collection(&app.ctx.db, collection.id, project.id)
        .await
        .expect("remove");
    assert_eq!(
        store::count_collection_projects(&app.ctx.db, collection.id)
            .await
            .expect("count"),
        0,
        "removed link is invisible to counts"
    );

    let restored = store::add_project_to_collection(&app.ctx.db, collection.id, project.id)
        .await
        .expect("re-add");

    assert_eq!(restored.id, original.id, "tombstoned row restored in place");
    assert!(restored.removed_at.is_none());
    let total_rows = CollectionProject::find()
        .count(&app.ctx.db)
        .await
        .expect("count rows");
    assert_eq!(total_rows, 1, "no duplicate link rows");
}

// ─── Status tracking ─────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_project_collection_is_ready_immediately_after_import() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "empty".to_string(),
            name: "Empty".to_string(),
            dependency_file: Some(
                json!({"bomFormat": "CycloneDX", "components": []}).to_string(),
            ),
            ..Default::default()
        },
    )
    .await;

    let summary = import::import_collection(&app.ctx, collection.id)
        .await
        .expect("import succeeds");
    assert_eq!(summary.discovered, 0);

    let collection = reload(&app, collection.id).await;
    assert_eq!(collection.import_status, ImportStatus::Completed);
    assert_eq!(collection.sync_status, SyncStatus::Ready);
    assert!(app.queue.is_empty(), "no polling loop for a ready collection");
}

#[tokio::test]
async fn partial_progress_broadcasts_and_stays_syncing() {
    let app = setup().await;
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "partial".to_string(),
            name: "Partial".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let collection = store::begin_import(&app.ctx.db, collection)
        .await
        .expect("begin import");
    let collection = store::complete_import(&app.ctx.db, collection)
        .await
        .expect("complete import into syncing state");

    for i in 0..5 {
        let project = store::find_or_create_project(
            &app.ctx.db,
            &format!("https://github.com/rails/repo-{i}"),
        )
        .await
        .expect("create project");
        store::add_project_to_collection(&app.ctx.db, collection.id, project.id)
            .await
            .expect("link");
        if i < 3 {
            let mut active = project.into_active_model();
            active.last_synced_at = Set(Some(Utc::now().fixed_offset()));
            active.update(&app.ctx.db).await.expect("stamp sync");
        }
    }

    let counts = status::progress(&app.ctx.db, collection.id)
        .await
        .expect("progress");
    assert_eq!(counts.synced, 3);
    assert_eq!(counts.total, 5);
    assert!(!counts.complete());

    let after = status::check_sync_status(&app.ctx, collection.id)
        .await
        .expect("check");
    assert_eq!(after, Some(SyncStatus::Syncing));

    let events = app.publisher.events();
    let progress = events
        .iter()
        .find(|(_, payload)| payload["kind"] == "progress_update")
        .expect("progress event broadcast");
    assert_eq!(progress.1["progress"]["synced"], 3);
    assert_eq!(progress.1["progress"]["total"], 5);
}

#[tokio::test]
async fn poll_self_terminates_when_the_collection_is_gone_or_done() {
    let app = setup().await;

    // Missing collection: silent no-op, nothing re-scheduled.
    status::poll_collection(&app.ctx, Uuid::new_v4())
        .await
        .expect("poll tolerates a missing collection");
    assert!(app.queue.is_empty());

    // Ready collection: evaluated, not re-scheduled.
    let collection = make_collection(
        &app,
        NewCollection {
            slug: "done".to_string(),
            name: "Done".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let collection =
        store::set_collection_sync_status(&app.ctx.db, collection, SyncStatus::Ready)
            .await
            .expect("mark ready");
    status::poll_collection(&app.ctx, collection.id)
        .await
        .expect("poll a ready collection");
    assert!(app.queue.is_empty());

    // Still-syncing collection: re-scheduled with the poll delay.
    let syncing = make_collection(
        &app,
        NewCollection {
            slug: "running".to_string(),
            name: "Running".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let syncing = store::begin_import(&app.ctx.db, syncing).await.expect("begin");
    let syncing = store::complete_import(&app.ctx.db, syncing)
        .await
        .expect("complete");
    let project = store::find_or_create_project(&app.ctx.db, "https://github.com/rails/rails")
        .await
        .expect("create project");
    store::add_project_to_collection(&app.ctx.db, syncing.id, project.id)
        .await
        .expect("link");

    status::poll_collection(&app.ctx, syncing.id)
        .await
        .expect("poll a syncing collection");
    assert_eq!(
        app.queue.queued(),
        vec![(
            Some(Duration::from_secs(POLL_INTERVAL_SECS)),
            Job::CheckCollectionStatus {
                collection_id: syncing.id
            }
        )]
    );
}
