//! Advisory entity - security advisories, keyed by upstream uuid.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "advisories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub project_id: Uuid,

    /// Upstream advisory uuid; globally unique natural key.
    #[sea_orm(unique)]
    pub uuid: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,
    pub severity: Option<String>,
    pub published_at: Option<DateTimeWithTimeZone>,
    /// CVE/GHSA identifiers.
    #[sea_orm(column_type = "Json")]
    pub identifiers: serde_json::Value,

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
