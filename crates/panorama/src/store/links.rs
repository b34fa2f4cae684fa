//! Collection↔Project link operations.
//!
//! The unique (collection_id, project_id) constraint spans tombstoned rows,
//! so registration always looks up first and restores a tombstone instead of
//! inserting a second row for the same pair.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection, IntoActiveModel, JoinType, QuerySelect};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::store::StoreError;

/// Register a project in a collection, restoring a soft-deleted link when one
/// exists for the pair.
pub async fn add_project_to_collection(
    db: &DatabaseConnection,
    collection_id: Uuid,
    project_id: Uuid,
) -> Result<CollectionProjectModel, StoreError> {
    let existing = CollectionProject::find()
        .filter(CollectionProjectColumn::CollectionId.eq(collection_id))
        .filter(CollectionProjectColumn::ProjectId.eq(project_id))
        .one(db)
        .await?;

    match existing {
        Some(link) if link.is_active() => Ok(link),
        Some(link) => {
            let mut active = link.into_active_model();
            active.removed_at = Set(None);
            active.updated_at = Set(Utc::now().fixed_offset());
            Ok(active.update(db).await?)
        }
        None => {
            let now = Utc::now().fixed_offset();
            let model = CollectionProjectActiveModel {
                id: Set(Uuid::new_v4()),
                collection_id: Set(collection_id),
                project_id: Set(project_id),
                removed_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };
            Ok(model.insert(db).await?)
        }
    }
}

/// Soft-remove a project from a collection. No-op when no active link exists.
pub async fn remove_project_from_collection(
    db: &DatabaseConnection,
    collection_id: Uuid,
    project_id: Uuid,
) -> Result<(), StoreError> {
    let existing = CollectionProject::find()
        .filter(CollectionProjectColumn::CollectionId.eq(collection_id))
        .filter(CollectionProjectColumn::ProjectId.eq(project_id))
        .filter(CollectionProjectColumn::RemovedAt.is_null())
        .one(db)
        .await?;

    if let Some(link) = existing {
        let now = Utc::now().fixed_offset();
        let mut active = link.into_active_model();
        active.removed_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(db).await?;
    }
    Ok(())
}

/// Count of active (non-tombstoned) projects in a collection.
pub async fn count_collection_projects(
    db: &DatabaseConnection,
    collection_id: Uuid,
) -> Result<u64, StoreError> {
    let count = CollectionProject::find()
        .filter(CollectionProjectColumn::CollectionId.eq(collection_id))
        .filter(CollectionProjectColumn::RemovedAt.is_null())
        .count(db)
        .await?;
    Ok(count)
}

/// Count of active projects in a collection that have completed a full sync.
pub async fn count_synced_collection_projects(
    db: &DatabaseConnection,
    collection_id: Uuid,
) -> Result<u64, StoreError> {
    let count = CollectionProject::find()
        .join(
            JoinType::InnerJoin,
            crate::entity::collection_project::Relation::Project.def(),
        )
        .filter(CollectionProjectColumn::CollectionId.eq(collection_id))
        .filter(CollectionProjectColumn::RemovedAt.is_null())
        .filter(ProjectColumn::LastSyncedAt.is_not_null())
        .count(db)
        .await?;
    Ok(count)
}
