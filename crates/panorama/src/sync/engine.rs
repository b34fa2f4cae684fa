//! The per-project sync engine.
//!
//! `sync_project` runs the documented step sequence: canonicalize URL,
//! repository snapshot, packages, the low-value-fork gate, readme, tags,
//! advisories, issues, commits, dependencies, funding, and the final stamp
//! plus notifications. Steps are fault-isolated; a failed fetch leaves its
//! sub-resource stale and the run continues. Idempotent upserts, not the
//! advisory job-id marker, are the correctness mechanism against concurrent
//! or redelivered runs.

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, IntoActiveModel};
use uuid::Uuid;

use crate::context::AppContext;
use crate::entity::prelude::*;
use crate::gateway::GatewayError;
use crate::store::{self, StoreError};
use crate::sync::progress::{ProgressCallback, SyncProgress, emit};
use crate::sync::types::{
    FORK_STAR_THRESHOLD, FRESH_WINDOW_HOURS, MAX_PACKAGE_PAGES, MAX_RESOURCE_PAGES, SyncOptions,
    SyncOutcome, SyncOutcomeKind,
};
use crate::sync::collect_funding_links;
use crate::upstream::{
    AdvisoryInfo, ArchiveContents, CommitInfo, IssueInfo, ManifestInfo, PER_PAGE, PackageInfo,
    RepositoryInfo, TagInfo,
};
use crate::status;

/// Sync one project end to end.
///
/// Idempotent and re-entrant: a project fully synced within the freshness
/// window is a no-op unless `options.force` is set. The job-id marker is
/// cleared on every outcome, including an aborted run.
#[tracing::instrument(skip_all, fields(%project_id))]
pub async fn sync_project(
    ctx: &AppContext,
    project_id: Uuid,
    options: &SyncOptions,
    progress: Option<&ProgressCallback>,
) -> Result<SyncOutcome, StoreError> {
    let result = run_sync(ctx, project_id, options, progress).await;
    if result.is_err() {
        release_job_marker(ctx, project_id).await;
    }
    result
}

async fn run_sync(
    ctx: &AppContext,
    project_id: Uuid,
    options: &SyncOptions,
    progress: Option<&ProgressCallback>,
) -> Result<SyncOutcome, StoreError> {
    let mut project = load_project(ctx, project_id).await?;

    if !options.force && is_fresh(&project) {
        emit(progress, SyncProgress::Fresh);
        tracing::debug!(url = %project.url, "project synced recently, skipping");
        if project.sync_job_id.is_some() {
            clear_job_marker(ctx, project).await?;
        }
        return Ok(SyncOutcome::empty(SyncOutcomeKind::Fresh));
    }

    emit(
        progress,
        SyncProgress::Started {
            url: project.url.clone(),
        },
    );
    tracing::info!(url = %project.url, "syncing project");

    // Stamp syncing state and the advisory job marker.
    {
        let mut active = project.clone().into_active_model();
        active.sync_status = Set(SyncStatus::Syncing);
        active.sync_job_id = Set(options.job_id);
        active.updated_at = Set(Utc::now().fixed_offset());
        project = active.update(&ctx.db).await?;
    }
    ctx.broadcaster
        .broadcast_project_status(project.id, &SyncStatus::Syncing);

    let mut outcome = SyncOutcome::empty(SyncOutcomeKind::Completed);

    // ─── Steps 1-2: canonicalize URL + repository snapshot ───────────────────
    //
    // One lookup call serves both: the response URL is the canonical form
    // (the upstream follows renames), and the body is the snapshot.
    let lookup = ctx.upstream.repository_lookup(&project.url);
    match ctx.gateway.get_json_opt::<RepositoryInfo>(&lookup).await {
        Ok(Some(info)) => {
            let canonical =
                store::normalize_url(info.url.as_deref().unwrap_or(&project.url));
            if canonical != project.url {
                if let Some(existing) = store::find_project_by_url(&ctx.db, &canonical).await?
                    && existing.id != project.id
                {
                    // Duplicate URL conflict: the canonical project already
                    // exists, so this row (and its children, by cascade) is
                    // removed and the run aborts.
                    tracing::warn!(
                        url = %project.url,
                        canonical = %canonical,
                        "canonical URL collides with existing project, removing duplicate"
                    );
                    store::delete_project(&ctx.db, project.id).await?;
                    emit(progress, SyncProgress::Completed);
                    return Ok(SyncOutcome::empty(SyncOutcomeKind::DuplicateRemoved));
                }
            }
            project = apply_snapshot(ctx, project, &canonical, &info).await?;
            emit(
                progress,
                SyncProgress::StepCompleted {
                    step: "repository",
                    count: 1,
                },
            );
        }
        Ok(None) => {
            soft_fail(&mut outcome, progress, "repository", "not found upstream");
        }
        Err(e) => {
            soft_fail(&mut outcome, progress, "repository", &e.to_string());
        }
    }

    // ─── Step 3: packages ────────────────────────────────────────────────────
    let mut packages: Vec<PackageModel> = Vec::new();
    match fetch_packages(ctx, &project.url).await {
        Ok(infos) => {
            let mut failed = false;
            for info in &infos {
                match store::upsert_package(&ctx.db, project.id, info).await {
                    Ok(model) => packages.push(model),
                    Err(e) => {
                        failed = true;
                        soft_fail(&mut outcome, progress, "packages", &e.to_string());
                        break;
                    }
                }
            }
            if !failed {
                outcome.packages = packages.len();
                let mut active = project.clone().into_active_model();
                active.packages_last_synced_at = Set(Some(Utc::now().fixed_offset()));
                if let Some(licenses) = derive_licenses(&project, &packages) {
                    active.license_spdx = Set(Some(licenses));
                }
                project = active.update(&ctx.db).await?;
                emit(
                    progress,
                    SyncProgress::StepCompleted {
                        step: "packages",
                        count: outcome.packages,
                    },
                );
            }
        }
        Err(e) => {
            soft_fail(&mut outcome, progress, "packages", &e.to_string());
        }
    }

    // ─── Step 4: low-value-fork gate ─────────────────────────────────────────
    //
    // A failed package fetch must not make a fork look package-less; fall
    // back to what earlier runs stored.
    let known_packages = if packages.is_empty() {
        store::count_packages(&ctx.db, project.id).await?
    } else {
        packages.len() as u64
    };
    let skip_deep = project.fork
        && known_packages == 0
        && !project.archived
        && project.stars.unwrap_or(0) <= FORK_STAR_THRESHOLD;
    outcome.skipped_low_value_fork = skip_deep;

    if skip_deep {
        emit(progress, SyncProgress::SkippedLowValueFork);
        tracing::debug!(url = %project.url, "low-value fork, skipping deep resource sync");
    } else {
        // ─── Step 5: readme ──────────────────────────────────────────────────
        match fetch_readme(ctx, &project).await {
            Ok(Some(contents)) => {
                let mut active = project.clone().into_active_model();
                active.readme = Set(Some(contents));
                active.updated_at = Set(Utc::now().fixed_offset());
                project = active.update(&ctx.db).await?;
                emit(
                    progress,
                    SyncProgress::StepCompleted {
                        step: "readme",
                        count: 1,
                    },
                );
            }
            Ok(None) => {}
            Err(e) => {
                soft_fail(&mut outcome, progress, "readme", &e);
            }
        }

        // ─── Step 6: tags, advisories, issues, commits ───────────────────────
        match sync_tags(ctx, &project).await {
            Ok(count) => {
                outcome.tags = count;
                let mut active = project.clone().into_active_model();
                active.tags_last_synced_at = Set(Some(Utc::now().fixed_offset()));
                project = active.update(&ctx.db).await?;
                emit(progress, SyncProgress::StepCompleted { step: "tags", count });
            }
            Err(e) => soft_fail(&mut outcome, progress, "tags", &e),
        }

        match sync_advisories(ctx, &project).await {
            Ok(count) => {
                outcome.advisories = count;
                emit(
                    progress,
                    SyncProgress::StepCompleted {
                        step: "advisories",
                        count,
                    },
                );
            }
            Err(e) => soft_fail(&mut outcome, progress, "advisories", &e),
        }

        match sync_issues(ctx, &project).await {
            Ok(count) => {
                outcome.issues = count;
                let mut active = project.clone().into_active_model();
                active.issues_last_synced_at = Set(Some(Utc::now().fixed_offset()));
                project = active.update(&ctx.db).await?;
                emit(
                    progress,
                    SyncProgress::StepCompleted {
                        step: "issues",
                        count,
                    },
                );
            }
            Err(e) => soft_fail(&mut outcome, progress, "issues", &e),
        }

        match sync_commits(ctx, &project).await {
            Ok(count) => {
                outcome.commits = count;
                let mut active = project.clone().into_active_model();
                active.commits_last_synced_at = Set(Some(Utc::now().fixed_offset()));
                project = active.update(&ctx.db).await?;
                emit(
                    progress,
                    SyncProgress::StepCompleted {
                        step: "commits",
                        count,
                    },
                );
            }
            Err(e) => soft_fail(&mut outcome, progress, "commits", &e),
        }
    }

    // ─── Step 7: dependency manifests ────────────────────────────────────────
    //
    // Runs even for skipped forks: forks still matter as dependents.
    match fetch_dependencies(ctx, &project.url).await {
        Ok(classified) => {
            let mut active = project.clone().into_active_model();
            active.dependencies = Set(Some(classified));
            active.dependencies_last_synced_at = Set(Some(Utc::now().fixed_offset()));
            project = active.update(&ctx.db).await?;
            emit(
                progress,
                SyncProgress::StepCompleted {
                    step: "dependencies",
                    count: 1,
                },
            );
        }
        Err(e) => soft_fail(&mut outcome, progress, "dependencies", &e.to_string()),
    }

    // ─── Step 8: funding ─────────────────────────────────────────────────────
    {
        let funding =
            collect_funding_links(&project.repo_metadata, &packages, project.readme.as_deref());
        let mut active = project.clone().into_active_model();
        active.collective_url = Set(funding.collective_url.clone());
        active.github_sponsors = Set(funding.github_sponsors);
        active.funding_links = Set(serde_json::json!(funding.links));
        active.updated_at = Set(Utc::now().fixed_offset());
        project = active.update(&ctx.db).await?;
        emit(
            progress,
            SyncProgress::StepCompleted {
                step: "funding",
                count: funding.links.len(),
            },
        );
    }

    // ─── Step 9: stamp, ping, notify ─────────────────────────────────────────
    {
        let now = Utc::now().fixed_offset();
        let mut active = project.clone().into_active_model();
        active.last_synced_at = Set(Some(now));
        active.sync_status = Set(SyncStatus::Ready);
        active.sync_job_id = Set(None);
        active.updated_at = Set(now);
        project = active.update(&ctx.db).await?;
    }
    ctx.broadcaster
        .broadcast_project_status(project.id, &SyncStatus::Ready);

    for ping_url in ctx.upstream.ping_urls(&project.url) {
        ctx.gateway.post_ping(&ping_url).await;
    }

    notify_syncing_collections(ctx, project.id).await;

    emit(progress, SyncProgress::Completed);
    tracing::info!(
        url = %project.url,
        packages = outcome.packages,
        issues = outcome.issues,
        commits = outcome.commits,
        soft_errors = outcome.soft_errors.len(),
        "project sync completed"
    );
    Ok(outcome)
}

async fn load_project(ctx: &AppContext, project_id: Uuid) -> Result<ProjectModel, StoreError> {
    Project::find_by_id(project_id)
        .one(&ctx.db)
        .await?
        .ok_or_else(|| StoreError::not_found("project", project_id))
}

fn is_fresh(project: &ProjectModel) -> bool {
    project
        .last_synced_at
        .is_some_and(|t| Utc::now().fixed_offset() - t < ChronoDuration::hours(FRESH_WINDOW_HOURS))
}

async fn clear_job_marker(ctx: &AppContext, project: ProjectModel) -> Result<(), StoreError> {
    let mut active = project.into_active_model();
    active.sync_job_id = Set(None);
    active.update(&ctx.db).await?;
    Ok(())
}

/// Best-effort cleanup after an aborted run: the marker must not outlive the
/// job, and the project lands in `error` state instead of a stuck `syncing`.
async fn release_job_marker(ctx: &AppContext, project_id: Uuid) {
    let project = match Project::find_by_id(project_id).one(&ctx.db).await {
        Ok(Some(project)) => project,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(%project_id, error = %e, "failed to load project for marker release");
            return;
        }
    };
    let mut active = project.into_active_model();
    active.sync_job_id = Set(None);
    active.sync_status = Set(SyncStatus::Error);
    if let Err(e) = active.update(&ctx.db).await {
        tracing::warn!(%project_id, error = %e, "failed to release sync job marker");
    }
}

fn soft_fail(
    outcome: &mut SyncOutcome,
    progress: Option<&ProgressCallback>,
    step: &'static str,
    message: &str,
) {
    tracing::warn!(step, error = %message, "sync step failed, continuing");
    outcome.soft_errors.push(format!("{step}: {message}"));
    emit(
        progress,
        SyncProgress::StepFailed {
            step,
            message: message.to_string(),
        },
    );
}

async fn apply_snapshot(
    ctx: &AppContext,
    project: ProjectModel,
    canonical_url: &str,
    info: &RepositoryInfo,
) -> Result<ProjectModel, StoreError> {
    let mut active = project.into_active_model();
    active.url = Set(canonical_url.to_string());
    active.full_name = Set(info.full_name.clone());
    active.owner = Set(info.owner.clone());
    active.description = Set(info.description.clone());
    active.language = Set(info.language.clone());
    active.homepage = Set(info.homepage.clone());
    active.stars = Set(info.stargazers_count);
    active.forks = Set(info.forks_count);
    active.archived = Set(info.archived);
    active.fork = Set(info.fork);
    active.license_spdx = Set(info.license.clone());
    active.repo_created_at = Set(info.created_at.map(|t| t.fixed_offset()));
    active.repo_updated_at = Set(info.updated_at.map(|t| t.fixed_offset()));
    active.repo_pushed_at = Set(info.pushed_at.map(|t| t.fixed_offset()));
    active.repo_metadata = Set(info.metadata.clone());
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(&ctx.db).await?)
}

/// Union of repo-declared license and package licenses, deduplicated.
fn derive_licenses(project: &ProjectModel, packages: &[PackageModel]) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut push = |license: &str| {
        for part in license.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if !seen.iter().any(|s| s == part) {
                seen.push(part.to_string());
            }
        }
    };

    if let Some(license) = &project.license_spdx {
        push(license);
    }
    for package in packages {
        if let Some(licenses) = &package.licenses {
            push(licenses);
        }
    }

    if seen.is_empty() {
        None
    } else {
        Some(seen.join(", "))
    }
}

async fn fetch_packages(
    ctx: &AppContext,
    repo_url: &str,
) -> Result<Vec<PackageInfo>, GatewayError> {
    ctx.gateway
        .fetch_paginated(
            |page| ctx.upstream.repository_packages(repo_url, page),
            PER_PAGE,
            MAX_PACKAGE_PAGES,
        )
        .await
}

/// Primary path: registry-archive lookup by the detected readme filename.
/// Fallback: raw-content fetch of `README.md` when the full name is known.
async fn fetch_readme(ctx: &AppContext, project: &ProjectModel) -> Result<Option<String>, String> {
    let filename = project.readme_filename().unwrap_or("README.md");
    let archive_url = ctx.upstream.readme_archive(&project.url, filename);
    match ctx.gateway.get_json_opt::<ArchiveContents>(&archive_url).await {
        Ok(Some(archive)) if archive.contents.is_some() => return Ok(archive.contents),
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(url = %project.url, error = %e, "readme archive lookup failed");
        }
    }

    let Some(full_name) = &project.full_name else {
        return Ok(None);
    };
    let raw_url = ctx.upstream.raw_readme(full_name);
    match ctx.gateway.get_text(&raw_url).await {
        Ok(text) => Ok(Some(text)),
        Err(GatewayError::Status { status: 404, .. }) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

async fn sync_tags(ctx: &AppContext, project: &ProjectModel) -> Result<usize, String> {
    let infos: Vec<TagInfo> = ctx
        .gateway
        .fetch_paginated(
            |page| ctx.upstream.repository_tags(&project.url, page),
            PER_PAGE,
            MAX_RESOURCE_PAGES,
        )
        .await
        .map_err(|e| e.to_string())?;
    for info in &infos {
        store::upsert_tag(&ctx.db, project.id, info)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(infos.len())
}

async fn sync_advisories(ctx: &AppContext, project: &ProjectModel) -> Result<usize, String> {
    let infos: Vec<AdvisoryInfo> = ctx
        .gateway
        .fetch_paginated(
            |page| ctx.upstream.repository_advisories(&project.url, page),
            PER_PAGE,
            MAX_RESOURCE_PAGES,
        )
        .await
        .map_err(|e| e.to_string())?;
    for info in &infos {
        store::upsert_advisory(&ctx.db, project.id, info)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(infos.len())
}

async fn sync_issues(ctx: &AppContext, project: &ProjectModel) -> Result<usize, String> {
    let infos: Vec<IssueInfo> = ctx
        .gateway
        .fetch_paginated(
            |page| ctx.upstream.repository_issues(&project.url, page),
            PER_PAGE,
            MAX_RESOURCE_PAGES,
        )
        .await
        .map_err(|e| e.to_string())?;
    for info in &infos {
        store::upsert_issue(&ctx.db, project.id, info)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(infos.len())
}

async fn sync_commits(ctx: &AppContext, project: &ProjectModel) -> Result<usize, String> {
    let infos: Vec<CommitInfo> = ctx
        .gateway
        .fetch_paginated(
            |page| ctx.upstream.repository_commits(&project.url, page),
            PER_PAGE,
            MAX_RESOURCE_PAGES,
        )
        .await
        .map_err(|e| e.to_string())?;
    for info in &infos {
        store::upsert_commit(&ctx.db, project.id, info)
            .await
            .map_err(|e| e.to_string())?;
    }
    Ok(infos.len())
}

/// Fetch the manifest graph and classify entries into direct, development
/// and transitive buckets using the manifest flags and dependency kinds.
async fn fetch_dependencies(
    ctx: &AppContext,
    repo_url: &str,
) -> Result<serde_json::Value, GatewayError> {
    let url = ctx.upstream.repository_manifests(repo_url);
    let manifests: Vec<ManifestInfo> = ctx.gateway.get_json(&url).await?;

    let mut direct = Vec::new();
    let mut development = Vec::new();
    let mut transitive = Vec::new();

    for manifest in &manifests {
        for dep in &manifest.dependencies {
            let entry = serde_json::json!({
                "package_name": dep.package_name,
                "ecosystem": dep.ecosystem,
                "requirements": dep.requirements,
                "kind": dep.kind,
            });
            let is_development = dep
                .kind
                .as_deref()
                .is_some_and(|k| k == "development" || k == "dev" || k == "test");
            if is_development {
                development.push(entry);
            } else if dep.direct {
                direct.push(entry);
            } else {
                transitive.push(entry);
            }
        }
    }

    Ok(serde_json::json!({
        "direct": direct,
        "development": development,
        "transitive": transitive,
    }))
}

/// Tell collections in `syncing` state that one of their projects finished,
/// so aggregate progress can be re-evaluated immediately. Failures here must
/// not fail the sync itself.
async fn notify_syncing_collections(ctx: &AppContext, project_id: Uuid) {
    let collections = match store::syncing_collections_for_project(&ctx.db, project_id).await {
        Ok(collections) => collections,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load syncing collections for notification");
            return;
        }
    };

    for collection in collections {
        if let Err(e) = status::check_sync_status(ctx, collection.id).await {
            tracing::warn!(
                collection = %collection.slug,
                error = %e,
                "collection status re-evaluation failed"
            );
        }
    }
}
