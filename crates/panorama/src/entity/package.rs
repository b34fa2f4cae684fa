//! Package entity - a registry release channel for a project.
//!
//! Natural key: (project_id, ecosystem, name). Sync upserts by the natural
//! key so re-running never creates duplicates.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub project_id: Uuid,

    pub ecosystem: String,
    pub name: String,
    pub purl: Option<String>,

    pub licenses: Option<String>,
    /// Download count; absent upstream values default to 0.
    #[sea_orm(default_value = 0)]
    pub downloads: i64,
    /// Dependent repository count; absent upstream values default to 0.
    #[sea_orm(default_value = 0)]
    pub dependent_repos_count: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub repository_url: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub funding: Option<serde_json::Value>,
    #[sea_orm(column_type = "Json", nullable)]
    pub rankings: Option<serde_json::Value>,
    #[sea_orm(column_type = "Json")]
    pub metadata: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Best (lowest) rank across the registry ranking facets. Rankings sort
    /// ascending; a package with no numeric rank sorts after every ranked
    /// one, which `None` expresses here.
    pub fn best_ranking(&self) -> Option<f64> {
        let rankings = self.rankings.as_ref()?.as_object()?;
        rankings
            .values()
            .filter_map(serde_json::Value::as_f64)
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn make_package(rankings: Option<serde_json::Value>) -> Model {
        Model {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            ecosystem: "rubygems".to_string(),
            name: "rails".to_string(),
            purl: None,
            licenses: None,
            downloads: 0,
            dependent_repos_count: 0,
            repository_url: None,
            funding: None,
            rankings,
            metadata: json!({}),
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn best_ranking_takes_the_lowest_numeric_facet() {
        let package = make_package(Some(json!({
            "downloads": 3.2,
            "dependent_repos": 1.5,
            "stargazers": null,
        })));
        assert_eq!(package.best_ranking(), Some(1.5));
    }

    #[test]
    fn best_ranking_is_none_when_every_facet_is_null() {
        assert_eq!(make_package(Some(json!({"downloads": null}))).best_ranking(), None);
        assert_eq!(make_package(None).best_ranking(), None);
    }
}
