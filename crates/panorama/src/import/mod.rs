//! Collection import orchestrator.
//!
//! Resolves a collection's import source into candidate project URLs,
//! registers (or restores) each project in the collection, schedules sync
//! jobs for never-synced projects, and starts the status polling loop.
//! Progress is broadcast after every registration so observers see the
//! collection grow in near real time.

mod source;

pub use source::{CollectionSource, ImportError, organization_name};

use std::time::Duration;

use chrono::Utc;
use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use crate::context::AppContext;
use crate::entity::prelude::*;
use crate::jobs::Job;
use crate::sbom;
use crate::status::{self, POLL_INTERVAL_SECS, SyncProgressCounts};
use crate::store::{self, StoreError};
use crate::upstream::{CollectiveInfo, OrgRepositoryInfo, PER_PAGE};

/// Page cap for organization repository listings.
const MAX_ORG_PAGES: u32 = 100;

/// Result of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Candidate URLs discovered from the source, after deduplication.
    pub discovered: usize,
    /// Projects registered (created or restored) in the collection.
    pub registered: usize,
    /// Sync jobs enqueued for never-synced projects.
    pub scheduled: usize,
}

/// Import a collection from its source.
///
/// Fatal errors transition the collection to `error` with captured
/// diagnostics, broadcast the error state, and propagate to the caller so
/// the job runner's retry policy applies.
#[tracing::instrument(skip_all, fields(%collection_id))]
pub async fn import_collection(
    ctx: &AppContext,
    collection_id: Uuid,
) -> Result<ImportSummary, ImportError> {
    let collection = store::find_collection(&ctx.db, collection_id)
        .await?
        .ok_or_else(|| StoreError::not_found("collection", collection_id))?;

    match run_import(ctx, collection).await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            record_failure(ctx, collection_id, &e).await;
            Err(e)
        }
    }
}

async fn run_import(
    ctx: &AppContext,
    collection: CollectionModel,
) -> Result<ImportSummary, ImportError> {
    let source = CollectionSource::detect(&collection).ok_or(ImportError::NoSource)?;

    let collection = store::begin_import(&ctx.db, collection).await?;
    let counts = status::progress(&ctx.db, collection.id).await?;
    ctx.broadcaster.broadcast_status(&collection, counts);
    tracing::info!(slug = %collection.slug, ?source, "importing collection");

    let urls = enumerate_candidate_urls(ctx, &collection, &source).await?;
    let mut summary = ImportSummary {
        discovered: urls.len(),
        ..Default::default()
    };

    for url in &urls {
        let project = store::find_or_create_project(&ctx.db, url).await?;
        store::add_project_to_collection(&ctx.db, collection.id, project.id).await?;
        summary.registered += 1;

        if !project.ever_synced() {
            ctx.queue
                .enqueue(Job::SyncProject {
                    project_id: project.id,
                })
                .await;
            summary.scheduled += 1;
        }

        // Per-registration broadcast, not batched.
        let counts = status::progress(&ctx.db, collection.id).await?;
        ctx.broadcaster.broadcast_progress(collection.id, counts);
    }

    let collection = store::complete_import(&ctx.db, collection).await?;
    let counts = status::progress(&ctx.db, collection.id).await?;
    ctx.broadcaster.broadcast_status(&collection, counts);

    // Evaluate once immediately (a zero-project collection is ready right
    // away), then hand off to the polling loop if still syncing.
    if status::check_sync_status(ctx, collection.id).await? == Some(SyncStatus::Syncing) {
        ctx.queue
            .enqueue_in(
                Duration::from_secs(POLL_INTERVAL_SECS),
                Job::CheckCollectionStatus {
                    collection_id: collection.id,
                },
            )
            .await;
    }

    tracing::info!(
        slug = %collection.slug,
        discovered = summary.discovered,
        scheduled = summary.scheduled,
        "collection import completed"
    );
    Ok(summary)
}

/// Resolve the source into a deduplicated, normalized list of repository
/// URLs.
async fn enumerate_candidate_urls(
    ctx: &AppContext,
    collection: &CollectionModel,
    source: &CollectionSource,
) -> Result<Vec<String>, ImportError> {
    let raw_urls: Vec<String> = match source {
        CollectionSource::GithubOrganization(org_url) => {
            let org = organization_name(org_url).ok_or_else(|| {
                StoreError::invalid_input(format!("unusable organization URL: {org_url}"))
            })?;
            let repos: Vec<OrgRepositoryInfo> = ctx
                .gateway
                .fetch_paginated(
                    |page| ctx.upstream.organization_repositories(org, page),
                    PER_PAGE,
                    MAX_ORG_PAGES,
                )
                .await?;
            repos.iter().filter_map(|r| r.repository_url()).collect()
        }
        CollectionSource::Collective(collective_url) => {
            let info: CollectiveInfo = ctx
                .gateway
                .get_json(&ctx.upstream.collective_projects(collective_url))
                .await?;
            info.projects
                .iter()
                .filter_map(|p| p.repository_url())
                .collect()
        }
        CollectionSource::Repository(repo_url) => {
            // The repository itself is always part of the collection; its
            // SBOM expands it into its dependency projects.
            let mut urls = vec![repo_url.clone()];
            let sbom_url = ctx.upstream.repository_sbom(repo_url);
            match ctx
                .gateway
                .get_json_opt::<serde_json::Value>(&sbom_url)
                .await?
            {
                Some(document) => {
                    let purls = sbom::extract_purls(&document)?;
                    urls.extend(
                        sbom::resolve_to_project_urls(
                            &ctx.db,
                            &ctx.gateway,
                            &ctx.upstream,
                            &purls,
                        )
                        .await,
                    );
                }
                None => {
                    tracing::warn!(url = %repo_url, "no SBOM available for repository source");
                }
            }
            urls
        }
        CollectionSource::DependencyFile(raw) => {
            let document = sbom::parse_document(raw)?;
            persist_sbom(ctx, collection.id, raw, &document).await?;
            let purls = sbom::extract_purls(&document)?;
            sbom::resolve_to_project_urls(&ctx.db, &ctx.gateway, &ctx.upstream, &purls).await
        }
    };

    let mut urls: Vec<String> = Vec::new();
    for url in raw_urls {
        let normalized = store::normalize_url(&url);
        if !normalized.is_empty() && !urls.iter().any(|seen| *seen == normalized) {
            urls.push(normalized);
        }
    }
    Ok(urls)
}

/// Keep the raw uploaded document and its parsed form for auditability.
async fn persist_sbom(
    ctx: &AppContext,
    collection_id: Uuid,
    raw: &str,
    converted: &serde_json::Value,
) -> Result<(), StoreError> {
    let model = SbomActiveModel {
        id: Set(Uuid::new_v4()),
        collection_id: Set(collection_id),
        raw: Set(raw.to_string()),
        converted: Set(Some(converted.clone())),
        created_at: Set(Utc::now().fixed_offset()),
    };
    model.insert(&ctx.db).await?;
    Ok(())
}

async fn record_failure(ctx: &AppContext, collection_id: Uuid, error: &ImportError) {
    let backtrace = std::backtrace::Backtrace::force_capture().to_string();
    let collection = match store::find_collection(&ctx.db, collection_id).await {
        Ok(Some(collection)) => collection,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(%collection_id, error = %e, "failed to load collection for error state");
            return;
        }
    };

    match store::record_import_error(&ctx.db, collection, &error.to_string(), Some(backtrace))
        .await
    {
        Ok(collection) => {
            ctx.broadcaster
                .broadcast_error(&collection, SyncProgressCounts::default());
        }
        Err(e) => {
            tracing::error!(%collection_id, error = %e, "failed to record import error");
        }
    }
}
