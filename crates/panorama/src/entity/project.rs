//! Project entity - one tracked open-source project, identified by its
//! normalized repository URL.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::statuses::SyncStatus;

/// Project model. Created on first reference (lookup-or-create by normalized
/// URL) and mutated exclusively by sync operations.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Normalized repository URL. Unique; the project's identity.
    #[sea_orm(unique)]
    pub url: String,

    // ─── Repository snapshot ─────────────────────────────────────────────────
    pub full_name: Option<String>,
    pub owner: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub language: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub homepage: Option<String>,
    pub stars: Option<i32>,
    pub forks: Option<i32>,
    #[sea_orm(default_value = false)]
    pub archived: bool,
    #[sea_orm(default_value = false)]
    pub fork: bool,
    pub license_spdx: Option<String>,
    pub repo_created_at: Option<DateTimeWithTimeZone>,
    pub repo_updated_at: Option<DateTimeWithTimeZone>,
    pub repo_pushed_at: Option<DateTimeWithTimeZone>,
    /// Service-specific extras from the repository snapshot (readme filename,
    /// owner sponsor flag, funding block).
    #[sea_orm(column_type = "Json")]
    pub repo_metadata: serde_json::Value,
    #[sea_orm(column_type = "Text", nullable)]
    pub readme: Option<String>,

    // ─── Dependency graph snapshot ───────────────────────────────────────────
    /// Classified dependency entries: direct / development / transitive.
    #[sea_orm(column_type = "Json", nullable)]
    pub dependencies: Option<serde_json::Value>,

    // ─── Funding ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub collective_url: Option<String>,
    #[sea_orm(default_value = false)]
    pub github_sponsors: bool,
    #[sea_orm(column_type = "Json")]
    pub funding_links: serde_json::Value,

    // ─── Sync tracking ───────────────────────────────────────────────────────
    pub issues_last_synced_at: Option<DateTimeWithTimeZone>,
    pub commits_last_synced_at: Option<DateTimeWithTimeZone>,
    pub packages_last_synced_at: Option<DateTimeWithTimeZone>,
    pub tags_last_synced_at: Option<DateTimeWithTimeZone>,
    pub dependencies_last_synced_at: Option<DateTimeWithTimeZone>,
    pub last_synced_at: Option<DateTimeWithTimeZone>,
    pub sync_status: SyncStatus,
    /// Correlation with the in-flight background job. Advisory marker only,
    /// cleared on completion regardless of outcome; not a lock.
    pub sync_job_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::package::Entity")]
    Package,
    #[sea_orm(has_many = "super::issue::Entity")]
    Issue,
    #[sea_orm(has_many = "super::commit::Entity")]
    Commit,
    #[sea_orm(has_many = "super::tag::Entity")]
    Tag,
    #[sea_orm(has_many = "super::advisory::Entity")]
    Advisory,
    #[sea_orm(has_many = "super::collection_project::Entity")]
    CollectionProject,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commit.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl Related<super::advisory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Advisory.def()
    }
}

impl Related<super::collection_project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionProject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Readme filename detected by the repository service, if any.
    pub fn readme_filename(&self) -> Option<&str> {
        self.repo_metadata
            .get("readme_name")
            .and_then(|v| v.as_str())
    }

    /// Whether the project has ever completed a full sync.
    pub fn ever_synced(&self) -> bool {
        self.last_synced_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_model() -> Model {
        Model {
            id: Uuid::new_v4(),
            url: "https://github.com/rails/rails".to_string(),
            full_name: Some("rails/rails".to_string()),
            owner: Some("rails".to_string()),
            description: None,
            language: Some("Ruby".to_string()),
            homepage: None,
            stars: Some(55_000),
            forks: Some(21_000),
            archived: false,
            fork: false,
            license_spdx: Some("MIT".to_string()),
            repo_created_at: None,
            repo_updated_at: None,
            repo_pushed_at: None,
            repo_metadata: serde_json::json!({"readme_name": "README.rdoc"}),
            readme: None,
            dependencies: None,
            collective_url: None,
            github_sponsors: false,
            funding_links: serde_json::json!([]),
            issues_last_synced_at: None,
            commits_last_synced_at: None,
            packages_last_synced_at: None,
            tags_last_synced_at: None,
            dependencies_last_synced_at: None,
            last_synced_at: None,
            sync_status: SyncStatus::Pending,
            sync_job_id: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn readme_filename_reads_from_metadata() {
        let model = make_model();
        assert_eq!(model.readme_filename(), Some("README.rdoc"));
    }

    #[test]
    fn ever_synced_tracks_overall_timestamp() {
        let mut model = make_model();
        assert!(!model.ever_synced());
        model.last_synced_at = Some(Utc::now().fixed_offset());
        assert!(model.ever_synced());
    }
}
