//! Collection entity - a named group of projects imported from one source.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::statuses::{ImportStatus, SyncStatus};

/// Collection model.
///
/// Exactly one import source should be populated. When several are populated
/// anyway, import resolves them in fixed precedence: GitHub organization →
/// collective → single repository → uploaded dependency file.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// URL-safe unique slug.
    #[sea_orm(unique)]
    pub slug: String,
    pub name: String,

    // ─── Import source (one of) ──────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub github_organization_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub collective_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub repository_url: Option<String>,
    /// Raw uploaded SBOM / dependency-file content.
    #[sea_orm(column_type = "Text", nullable)]
    pub dependency_file: Option<String>,

    // ─── Lifecycle ───────────────────────────────────────────────────────────
    pub import_status: ImportStatus,
    pub sync_status: SyncStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error_message: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error_backtrace: Option<String>,
    pub last_errored_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::collection_project::Entity")]
    CollectionProject,
    #[sea_orm(has_many = "super::sbom::Entity")]
    Sbom,
}

impl Related<super::collection_project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionProject.def()
    }
}

impl Related<super::sbom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sbom.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether any import source is populated.
    pub fn has_source(&self) -> bool {
        self.github_organization_url.is_some()
            || self.collective_url.is_some()
            || self.repository_url.is_some()
            || self.dependency_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_model() -> Model {
        Model {
            id: Uuid::new_v4(),
            slug: "rails-ecosystem".to_string(),
            name: "Rails ecosystem".to_string(),
            github_organization_url: None,
            collective_url: None,
            repository_url: None,
            dependency_file: None,
            import_status: ImportStatus::Pending,
            sync_status: SyncStatus::Pending,
            last_error_message: None,
            last_error_backtrace: None,
            last_errored_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn has_source_requires_at_least_one_field() {
        let mut model = make_model();
        assert!(!model.has_source());

        model.dependency_file = Some("{}".to_string());
        assert!(model.has_source());
    }
}
