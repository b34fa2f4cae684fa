//! Project identity operations: normalized-URL lookup-or-create and the
//! destructive duplicate removal used by URL canonicalization.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::store::StoreError;

/// Normalize a repository URL into the project's identity form.
///
/// Lowercased, trimmed, trailing slash and `.git` suffix removed, so the same
/// repository referenced in different spellings maps to one project row.
pub fn normalize_url(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }
    normalized
}

pub async fn find_project_by_url(
    db: &DatabaseConnection,
    url: &str,
) -> Result<Option<ProjectModel>, StoreError> {
    let found = Project::find()
        .filter(ProjectColumn::Url.eq(normalize_url(url)))
        .one(db)
        .await?;
    Ok(found)
}

/// Look up a project by normalized URL, creating it in `pending` state when
/// it does not exist yet.
pub async fn find_or_create_project(
    db: &DatabaseConnection,
    url: &str,
) -> Result<ProjectModel, StoreError> {
    let normalized = normalize_url(url);
    if normalized.is_empty() {
        return Err(StoreError::invalid_input("project URL must not be empty"));
    }

    if let Some(existing) = find_project_by_url(db, &normalized).await? {
        return Ok(existing);
    }

    let now = Utc::now().fixed_offset();
    let model = ProjectActiveModel {
        id: Set(Uuid::new_v4()),
        url: Set(normalized),
        repo_metadata: Set(serde_json::json!({})),
        funding_links: Set(serde_json::json!([])),
        sync_status: Set(SyncStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Hard-delete a project row. Children cascade at the schema level; used only
/// by duplicate-URL conflict recovery.
pub async fn delete_project(db: &DatabaseConnection, id: Uuid) -> Result<(), StoreError> {
    Project::delete_by_id(id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_strips_noise() {
        assert_eq!(
            normalize_url("  https://GitHub.com/Rails/Rails/ "),
            "https://github.com/rails/rails"
        );
        assert_eq!(
            normalize_url("https://github.com/rails/rails.git"),
            "https://github.com/rails/rails"
        );
        assert_eq!(
            normalize_url("https://github.com/rails/rails"),
            "https://github.com/rails/rails"
        );
    }
}
