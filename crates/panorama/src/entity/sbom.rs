//! Sbom entity - raw uploaded SBOM documents.
//!
//! Only the raw text and the converted normalized form are persisted;
//! transient parse state (artifacts, PURLs) is derived on demand.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sboms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub collection_id: Uuid,

    /// Raw uploaded document text, exactly as received.
    #[sea_orm(column_type = "Text")]
    pub raw: String,
    /// Parsed and normalized form, when the raw text was valid JSON.
    #[sea_orm(column_type = "Json", nullable)]
    pub converted: Option<serde_json::Value>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collection::Entity",
        from = "Column::CollectionId",
        to = "super::collection::Column::Id"
    )]
    Collection,
}

impl Related<super::collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
