//! Integration tests for the per-project sync engine.
//!
//! Runs the full pipeline against an in-memory SQLite database and a mock
//! HTTP transport. Key scenarios:
//! - Double sync produces no duplicate child rows (upsert by natural key)
//! - Freshness window makes repeat syncs a no-op
//! - URL canonicalization removes the losing duplicate project
//! - The low-value-fork gate skips deep resource sync at <= 10 stars only
//! - An aborted run releases the advisory job marker

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::sync::Arc;

use chrono::Utc;
use panorama::context::AppContext;
use panorama::entity::prelude::*;
use panorama::gateway::ApiGateway;
use panorama::http::MockTransport;
use panorama::jobs::InMemoryQueue;
use panorama::status::{Broadcaster, MemoryPublisher};
use panorama::store;
use panorama::sync::{self, SyncOptions, SyncOutcomeKind};
use panorama::upstream::PackageInfo;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter,
};
use serde_json::json;
use uuid::Uuid;

struct TestApp {
    ctx: AppContext,
    transport: MockTransport,
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
        ctx: AppContext::new(db, gateway, queue, broadcaster),
        transport,
        publisher,
    }
}

const REPO_URL: &str = "https://github.com/rails/rails";

/// Register upstream responses for a complete, uneventful sync of REPO_URL.
fn mock_full_sync(app: &TestApp) {
    let upstream = &app.ctx.upstream;

    app.transport.push_json(
        upstream.repository_lookup(REPO_URL),
        json!({
            "url": REPO_URL,
            "full_name": "rails/rails",
            "owner": "rails",
            "language": "Ruby",
            "stargazers_count": 55_000,
            "forks_count": 21_000,
            "archived": false,
            "fork": false,
            "license": "MIT",
            "metadata": {"readme_name": "README.md"},
        }),
    );
    app.transport.push_json(
        upstream.repository_packages(REPO_URL, 1),
        json!([{
            "ecosystem": "rubygems",
            "name": "rails",
            "purl": "pkg:gem/rails",
            "licenses": "MIT",
            "downloads": 100_000,
        }]),
    );
    app.transport.push_json(
        upstream.readme_archive(REPO_URL, "README.md"),
        json!({"contents": "# Rails\nSupport: https://opencollective.com/rails"}),
    );
    app.transport.push_json(
        upstream.repository_tags(REPO_URL, 1),
        json!([{"name": "v7.0.0", "sha": "abc123"}]),
    );
    app.transport.push_json(
        upstream.repository_advisories(REPO_URL, 1),
        json!([{"uuid": "adv-1", "severity": "high", "identifiers": ["CVE-2024-0001"]}]),
    );
    app.transport.push_json(
        upstream.repository_issues(REPO_URL, 1),
        json!([
            {
                "number": 1,
                "title": "Bug",
                "state": "closed",
                "created_at": "2024-01-01T00:00:00Z",
                "closed_at": "2024-01-02T00:00:00Z",
            },
            {"number": 2, "title": "Add feature", "state": "open", "pull_request": true},
        ]),
    );
    app.transport.push_json(
        upstream.repository_commits(REPO_URL, 1),
        json!([{"sha": "deadbeef", "message": "Initial commit", "merge": false}]),
    );
    app.transport.push_json(
        upstream.repository_manifests(REPO_URL),
        json!([{
            "filepath": "Gemfile",
            "dependencies": [
                {"package_name": "rake", "direct": true, "kind": "runtime"},
                {"package_name": "minitest", "direct": true, "kind": "development"},
                {"package_name": "nokogiri", "direct": false, "kind": "runtime"},
            ],
        }]),
    );
}

async fn child_counts(app: &TestApp) -> (u64, u64, u64, u64, u64) {
    let db = &app.ctx.db;
    (
        Package::find().count(db).await.expect("count packages"),
        Issue::find().count(db).await.expect("count issues"),
        Commit::find().count(db).await.expect("count commits"),
        Tag::find().count(db).await.expect("count tags"),
        Advisory::find().count(db).await.expect("count advisories"),
    )
}

// ─── Full sync ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_sync_populates_snapshot_children_and_funding() {
    let app = setup().await;
    mock_full_sync(&app);

    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");

    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync should complete");

    assert_eq!(outcome.kind, SyncOutcomeKind::Completed);
    assert_eq!(outcome.packages, 1);
    assert_eq!(outcome.issues, 2);
    assert_eq!(outcome.commits, 1);
    assert_eq!(outcome.tags, 1);
    assert_eq!(outcome.advisories, 1);
    assert!(outcome.soft_errors.is_empty(), "{:?}", outcome.soft_errors);
    assert!(!outcome.skipped_low_value_fork);

    let project = Project::find_by_id(project.id)
        .one(&app.ctx.db)
        .await
        .expect("reload")
        .expect("project exists");
    assert_eq!(project.full_name.as_deref(), Some("rails/rails"));
    assert_eq!(project.stars, Some(55_000));
    assert_eq!(project.sync_status, SyncStatus::Ready);
    assert!(project.last_synced_at.is_some());
    assert!(project.packages_last_synced_at.is_some());
    assert!(project.issues_last_synced_at.is_some());
    assert!(project.sync_job_id.is_none());

    // Funding came from the README scrape.
    assert_eq!(
        project.collective_url.as_deref(),
        Some("https://opencollective.com/rails")
    );
    assert!(
        project.funding_links.as_array().is_some_and(|l| !l.is_empty()),
        "funding links should be recorded"
    );

    // Dependency classification from the manifest graph.
    let deps = project.dependencies.as_ref().expect("dependencies stored");
    assert_eq!(deps["direct"].as_array().map(Vec::len), Some(1));
    assert_eq!(deps["development"].as_array().map(Vec::len), Some(1));
    assert_eq!(deps["transitive"].as_array().map(Vec::len), Some(1));

    // Issue time-to-close is derived from the timestamps.
    let closed_issue = Issue::find()
        .filter(IssueColumn::Number.eq(1))
        .one(&app.ctx.db)
        .await
        .expect("query issue")
        .expect("issue exists");
    assert_eq!(closed_issue.time_to_close_seconds, Some(86_400));
}

#[tokio::test]
async fn double_sync_creates_no_duplicate_children() {
    let app = setup().await;
    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");

    mock_full_sync(&app);
    sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("first sync");
    let first = child_counts(&app).await;

    // Unchanged upstream data; force past the freshness window.
    mock_full_sync(&app);
    sync::sync_project(
        &app.ctx,
        project.id,
        &SyncOptions {
            force: true,
            job_id: None,
        },
        None,
    )
    .await
    .expect("second sync");
    let second = child_counts(&app).await;

    assert_eq!(first, (1, 2, 1, 1, 1));
    assert_eq!(second, first, "re-sync must update in place, not duplicate");
}

// ─── Freshness ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_project_sync_is_a_noop() {
    let app = setup().await;
    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");

    let mut active = project.clone().into_active_model();
    active.last_synced_at = Set(Some(Utc::now().fixed_offset()));
    active.update(&app.ctx.db).await.expect("stamp last sync");

    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("fresh sync");

    assert_eq!(outcome.kind, SyncOutcomeKind::Fresh);
    assert!(
        app.transport.requests().is_empty(),
        "a fresh project must not touch upstream"
    );
}

// ─── URL canonicalization ────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_canonical_url_removes_the_losing_project() {
    let app = setup().await;

    let winner = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("winner project");
    let loser = store::find_or_create_project(&app.ctx.db, "https://github.com/rails/old-rails")
        .await
        .expect("loser project");

    // The lookup follows the rename to the winner's URL.
    app.transport.push_json(
        app.ctx
            .upstream
            .repository_lookup("https://github.com/rails/old-rails"),
        json!({"url": REPO_URL, "full_name": "rails/rails"}),
    );

    let outcome = sync::sync_project(&app.ctx, loser.id, &SyncOptions::default(), None)
        .await
        .expect("sync resolves the conflict");

    assert_eq!(outcome.kind, SyncOutcomeKind::DuplicateRemoved);
    assert!(
        Project::find_by_id(loser.id)
            .one(&app.ctx.db)
            .await
            .expect("query loser")
            .is_none(),
        "the duplicate must be deleted"
    );
    assert!(
        Project::find_by_id(winner.id)
            .one(&app.ctx.db)
            .await
            .expect("query winner")
            .is_some()
    );
}

// ─── Low-value-fork gate ─────────────────────────────────────────────────────

fn mock_fork_lookup(app: &TestApp, stars: i32) {
    app.transport.push_json(
        app.ctx.upstream.repository_lookup(REPO_URL),
        json!({
            "url": REPO_URL,
            "full_name": "rails/rails",
            "fork": true,
            "archived": false,
            "stargazers_count": stars,
        }),
    );
    app.transport
        .push_json(app.ctx.upstream.repository_packages(REPO_URL, 1), json!([]));
    app.transport
        .push_json(app.ctx.upstream.repository_manifests(REPO_URL), json!([]));
}

#[tokio::test]
async fn low_value_fork_skips_deep_resource_sync() {
    let app = setup().await;
    mock_fork_lookup(&app, 10);

    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");
    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync");

    assert!(outcome.skipped_low_value_fork);
    assert_eq!(outcome.issues, 0);
    let issue_requests = app
        .transport
        .requests()
        .iter()
        .filter(|r| r.url.contains("issues.ecosyste.ms"))
        .count();
    assert_eq!(issue_requests, 0, "issues must not be fetched for the fork");

    // Dependencies still synced for the fork.
    let project = Project::find_by_id(project.id)
        .one(&app.ctx.db)
        .await
        .expect("reload")
        .expect("exists");
    assert!(project.dependencies_last_synced_at.is_some());
    assert!(project.last_synced_at.is_some());
}

#[tokio::test]
async fn fork_with_known_packages_is_not_gated_when_the_fetch_fails() {
    let app = setup().await;
    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");

    // An earlier run stored a package; this run's package fetch fails.
    let info: PackageInfo =
        serde_json::from_value(json!({"ecosystem": "rubygems", "name": "rails"}))
            .expect("package info");
    store::upsert_package(&app.ctx.db, project.id, &info)
        .await
        .expect("seed package");

    app.transport.push_json(
        app.ctx.upstream.repository_lookup(REPO_URL),
        json!({
            "url": REPO_URL,
            "full_name": "rails/rails",
            "fork": true,
            "archived": false,
            "stargazers_count": 0,
        }),
    );
    app.transport
        .push_status(app.ctx.upstream.repository_packages(REPO_URL, 1), 403);

    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync");

    assert!(
        !outcome.skipped_low_value_fork,
        "a fork with packages on record must still get a deep sync"
    );
}

#[tokio::test]
async fn fork_above_the_star_threshold_syncs_everything() {
    let app = setup().await;
    let upstream = &app.ctx.upstream;

    app.transport.push_json(
        upstream.repository_lookup(REPO_URL),
        json!({
            "url": REPO_URL,
            "full_name": "rails/rails",
            "fork": true,
            "archived": false,
            "stargazers_count": 11,
            "metadata": {"readme_name": "README.md"},
        }),
    );
    app.transport
        .push_json(upstream.repository_packages(REPO_URL, 1), json!([]));
    app.transport.push_json(
        upstream.readme_archive(REPO_URL, "README.md"),
        json!({"contents": "# fork"}),
    );
    app.transport
        .push_json(upstream.repository_tags(REPO_URL, 1), json!([]));
    app.transport
        .push_json(upstream.repository_advisories(REPO_URL, 1), json!([]));
    app.transport.push_json(
        upstream.repository_issues(REPO_URL, 1),
        json!([{"number": 7, "state": "open"}]),
    );
    app.transport
        .push_json(upstream.repository_commits(REPO_URL, 1), json!([]));
    app.transport
        .push_json(upstream.repository_manifests(REPO_URL), json!([]));

    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");
    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync");

    assert!(!outcome.skipped_low_value_fork);
    assert_eq!(outcome.issues, 1);
}

// ─── Fault isolation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_sub_fetches_leave_resources_stale_but_finish_the_sync() {
    let app = setup().await;
    let upstream = &app.ctx.upstream;

    app.transport.push_json(
        upstream.repository_lookup(REPO_URL),
        json!({"url": REPO_URL, "full_name": "rails/rails", "stargazers_count": 3}),
    );
    // Packages endpoint misbehaves; everything else has no mock registered
    // and fails at the transport, which must also be tolerated.
    app.transport
        .push_status(upstream.repository_packages(REPO_URL, 1), 403);

    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");
    let outcome = sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync completes despite failures");

    assert_eq!(outcome.kind, SyncOutcomeKind::Completed);
    assert!(!outcome.soft_errors.is_empty());

    let project = Project::find_by_id(project.id)
        .one(&app.ctx.db)
        .await
        .expect("reload")
        .expect("exists");
    assert!(project.packages_last_synced_at.is_none(), "failed resource stays stale");
    assert!(project.last_synced_at.is_some(), "overall stamp still applied");
    assert_eq!(project.sync_status, SyncStatus::Ready);
}

#[tokio::test]
async fn aborted_sync_releases_the_job_marker() {
    let app = setup().await;
    mock_full_sync(&app);
    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");

    // Reject the tags stamp so the run aborts mid-way with a store error.
    app.ctx
        .db
        .execute_unprepared(
            "CREATE TRIGGER reject_tag_stamp BEFORE UPDATE OF tags_last_synced_at ON projects \
             BEGIN SELECT RAISE(ABORT, 'tag stamp rejected'); END",
        )
        .await
        .expect("install trigger");

    let options = SyncOptions {
        force: false,
        job_id: Some(Uuid::new_v4()),
    };
    sync::sync_project(&app.ctx, project.id, &options, None)
        .await
        .expect_err("stamp failure must abort the run");

    let project = Project::find_by_id(project.id)
        .one(&app.ctx.db)
        .await
        .expect("reload")
        .expect("exists");
    assert!(project.sync_job_id.is_none(), "marker must not outlive the job");
    assert_eq!(project.sync_status, SyncStatus::Error);
    assert!(project.last_synced_at.is_none());
}

// ─── Collection notification ─────────────────────────────────────────────────

#[tokio::test]
async fn finished_sync_notifies_syncing_collections() {
    let app = setup().await;
    mock_full_sync(&app);

    let collection = store::create_collection(
        &app.ctx.db,
        store::NewCollection {
            slug: "rails".to_string(),
            name: "Rails".to_string(),
            dependency_file: Some("{}".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("create collection");
    let collection = store::begin_import(&app.ctx.db, collection)
        .await
        .expect("begin import");
    let collection = store::complete_import(&app.ctx.db, collection)
        .await
        .expect("complete import into syncing state");

    let project = store::find_or_create_project(&app.ctx.db, REPO_URL)
        .await
        .expect("create project");
    store::add_project_to_collection(&app.ctx.db, collection.id, project.id)
        .await
        .expect("link project");

    sync::sync_project(&app.ctx, project.id, &SyncOptions::default(), None)
        .await
        .expect("sync");

    // The only linked project finished, so the collection flipped to ready
    // and the transition was broadcast.
    let collection = store::find_collection(&app.ctx.db, collection.id)
        .await
        .expect("reload")
        .expect("exists");
    assert_eq!(collection.sync_status, SyncStatus::Ready);

    let events = app.publisher.events();
    let collection_topic = Broadcaster::collection_topic(collection.id);
    assert!(
        events
            .iter()
            .any(|(topic, payload)| *topic == collection_topic
                && payload["sync_status"] == "ready"),
        "ready transition should be broadcast on the collection topic: {events:?}"
    );
}
