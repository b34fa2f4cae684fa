//! Upsert-by-natural-key operations for project child resources.
//!
//! Each child is keyed by the identifier its upstream service treats as
//! stable (ecosystem+name, number, sha, name, uuid), so repeated sync runs
//! update in place.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, Condition, DatabaseConnection, IntoActiveModel};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::store::StoreError;
use crate::upstream::{AdvisoryInfo, CommitInfo, IssueInfo, PackageInfo, TagInfo};

pub async fn upsert_package(
    db: &DatabaseConnection,
    project_id: Uuid,
    info: &PackageInfo,
) -> Result<PackageModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let existing = Package::find()
        .filter(PackageColumn::ProjectId.eq(project_id))
        .filter(PackageColumn::Ecosystem.eq(&info.ecosystem))
        .filter(PackageColumn::Name.eq(&info.name))
        .one(db)
        .await?;

    // Absent counters default to zero.
    let downloads = info.downloads.unwrap_or(0);
    let dependents = info.dependent_repos_count.unwrap_or(0);

    let model = match existing {
        Some(package) => {
            let mut active = package.into_active_model();
            active.purl = Set(info.purl.clone());
            active.licenses = Set(info.licenses.clone());
            active.downloads = Set(downloads);
            active.dependent_repos_count = Set(dependents);
            active.repository_url = Set(info.repository_url.clone());
            active.funding = Set(info.funding.clone());
            active.rankings = Set(info.rankings.clone());
            active.metadata = Set(info.metadata.clone());
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let active = PackageActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                ecosystem: Set(info.ecosystem.clone()),
                name: Set(info.name.clone()),
                purl: Set(info.purl.clone()),
                licenses: Set(info.licenses.clone()),
                downloads: Set(downloads),
                dependent_repos_count: Set(dependents),
                repository_url: Set(info.repository_url.clone()),
                funding: Set(info.funding.clone()),
                rankings: Set(info.rankings.clone()),
                metadata: Set(info.metadata.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?
        }
    };
    Ok(model)
}

pub async fn upsert_issue(
    db: &DatabaseConnection,
    project_id: Uuid,
    info: &IssueInfo,
) -> Result<IssueModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let existing = Issue::find()
        .filter(IssueColumn::ProjectId.eq(project_id))
        .filter(IssueColumn::Number.eq(info.number))
        .one(db)
        .await?;

    let opened_at = info.created_at.map(|t| t.fixed_offset());
    let closed_at = info.closed_at.map(|t| t.fixed_offset());
    let time_to_close = match (info.created_at, info.closed_at) {
        (Some(opened), Some(closed)) => Some((closed - opened).num_seconds()),
        _ => None,
    };
    let labels = serde_json::json!(info.labels);

    let model = match existing {
        Some(issue) => {
            let mut active = issue.into_active_model();
            active.title = Set(info.title.clone());
            active.state = Set(info.state.clone());
            active.pull_request = Set(info.pull_request);
            active.user = Set(info.user.clone());
            active.labels = Set(labels);
            active.opened_at = Set(opened_at);
            active.updated_at_upstream = Set(info.updated_at.map(|t| t.fixed_offset()));
            active.closed_at = Set(closed_at);
            active.time_to_close_seconds = Set(time_to_close);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let active = IssueActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                number: Set(info.number),
                title: Set(info.title.clone()),
                state: Set(info.state.clone()),
                pull_request: Set(info.pull_request),
                user: Set(info.user.clone()),
                labels: Set(labels),
                opened_at: Set(opened_at),
                updated_at_upstream: Set(info.updated_at.map(|t| t.fixed_offset())),
                closed_at: Set(closed_at),
                time_to_close_seconds: Set(time_to_close),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?
        }
    };
    Ok(model)
}

pub async fn upsert_commit(
    db: &DatabaseConnection,
    project_id: Uuid,
    info: &CommitInfo,
) -> Result<CommitModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let existing = Commit::find()
        .filter(CommitColumn::ProjectId.eq(project_id))
        .filter(CommitColumn::Sha.eq(&info.sha))
        .one(db)
        .await?;

    let model = match existing {
        Some(commit) => {
            let mut active = commit.into_active_model();
            active.message = Set(info.message.clone());
            active.author = Set(info.author.clone());
            active.committer = Set(info.committer.clone());
            active.merge = Set(info.merge);
            active.committed_at = Set(info.timestamp.map(|t| t.fixed_offset()));
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let active = CommitActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                sha: Set(info.sha.clone()),
                message: Set(info.message.clone()),
                author: Set(info.author.clone()),
                committer: Set(info.committer.clone()),
                merge: Set(info.merge),
                committed_at: Set(info.timestamp.map(|t| t.fixed_offset())),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?
        }
    };
    Ok(model)
}

pub async fn upsert_tag(
    db: &DatabaseConnection,
    project_id: Uuid,
    info: &TagInfo,
) -> Result<TagModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let existing = Tag::find()
        .filter(TagColumn::ProjectId.eq(project_id))
        .filter(TagColumn::Name.eq(&info.name))
        .one(db)
        .await?;

    let model = match existing {
        Some(tag) => {
            let mut active = tag.into_active_model();
            active.sha = Set(info.sha.clone());
            active.published_at = Set(info.published_at.map(|t| t.fixed_offset()));
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let active = TagActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                name: Set(info.name.clone()),
                sha: Set(info.sha.clone()),
                published_at: Set(info.published_at.map(|t| t.fixed_offset())),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?
        }
    };
    Ok(model)
}

pub async fn upsert_advisory(
    db: &DatabaseConnection,
    project_id: Uuid,
    info: &AdvisoryInfo,
) -> Result<AdvisoryModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let existing = Advisory::find()
        .filter(AdvisoryColumn::Uuid.eq(&info.uuid))
        .one(db)
        .await?;

    let identifiers = serde_json::json!(info.identifiers);

    let model = match existing {
        Some(advisory) => {
            let mut active = advisory.into_active_model();
            active.project_id = Set(project_id);
            active.title = Set(info.title.clone());
            active.severity = Set(info.severity.clone());
            active.published_at = Set(info.published_at.map(|t| t.fixed_offset()));
            active.identifiers = Set(identifiers);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            let active = AdvisoryActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                uuid: Set(info.uuid.clone()),
                title: Set(info.title.clone()),
                severity: Set(info.severity.clone()),
                published_at: Set(info.published_at.map(|t| t.fixed_offset())),
                identifiers: Set(identifiers),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(db).await?
        }
    };
    Ok(model)
}

pub async fn count_packages(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<u64, StoreError> {
    Ok(Package::find()
        .filter(PackageColumn::ProjectId.eq(project_id))
        .count(db)
        .await?)
}

/// Find a package by version-stripped PURL, matching either a versionless
/// stored PURL exactly or a versioned one by its `key@` prefix.
pub async fn find_package_by_purl(
    db: &DatabaseConnection,
    purl: &str,
) -> Result<Option<PackageModel>, StoreError> {
    let key = crate::sbom::strip_purl_version(purl);
    let found = Package::find()
        .filter(
            Condition::any()
                .add(PackageColumn::Purl.eq(&key))
                .add(PackageColumn::Purl.starts_with(format!("{key}@"))),
        )
        .one(db)
        .await?;
    Ok(found)
}
