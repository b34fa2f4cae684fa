//! Issue entity - issues and pull requests, keyed by number per project.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub project_id: Uuid,

    /// Issue/PR number; natural key within the project.
    pub number: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,
    pub state: Option<String>,
    #[sea_orm(default_value = false)]
    pub pull_request: bool,
    pub user: Option<String>,
    #[sea_orm(column_type = "Json")]
    pub labels: serde_json::Value,

    pub opened_at: Option<DateTimeWithTimeZone>,
    pub updated_at_upstream: Option<DateTimeWithTimeZone>,
    pub closed_at: Option<DateTimeWithTimeZone>,
    /// Derived responsiveness metric; null while open.
    pub time_to_close_seconds: Option<i64>,

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
