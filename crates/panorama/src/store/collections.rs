//! Collection lifecycle operations: creation with source validation and the
//! import/sync status transitions.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, DatabaseConnection, IntoActiveModel, JoinType, QuerySelect};
use uuid::Uuid;

use crate::entity::prelude::*;
use crate::store::StoreError;

/// Fields for a new collection. Exactly one source field should be set.
#[derive(Debug, Clone, Default)]
pub struct NewCollection {
    pub slug: String,
    pub name: String,
    pub github_organization_url: Option<String>,
    pub collective_url: Option<String>,
    pub repository_url: Option<String>,
    pub dependency_file: Option<String>,
}

/// Create a collection, rejecting one with no import source.
pub async fn create_collection(
    db: &DatabaseConnection,
    new: NewCollection,
) -> Result<CollectionModel, StoreError> {
    if new.slug.trim().is_empty() {
        return Err(StoreError::invalid_input("collection slug must not be empty"));
    }
    let has_source = new.github_organization_url.is_some()
        || new.collective_url.is_some()
        || new.repository_url.is_some()
        || new.dependency_file.is_some();
    if !has_source {
        return Err(StoreError::invalid_input(
            "collection requires an import source",
        ));
    }

    let now = Utc::now().fixed_offset();
    let model = CollectionActiveModel {
        id: Set(Uuid::new_v4()),
        slug: Set(new.slug),
        name: Set(new.name),
        github_organization_url: Set(new.github_organization_url),
        collective_url: Set(new.collective_url),
        repository_url: Set(new.repository_url),
        dependency_file: Set(new.dependency_file),
        import_status: Set(ImportStatus::Pending),
        sync_status: Set(SyncStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

pub async fn find_collection(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<CollectionModel>, StoreError> {
    Ok(Collection::find_by_id(id).one(db).await?)
}

pub async fn find_collection_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<CollectionModel>, StoreError> {
    Ok(Collection::find()
        .filter(CollectionColumn::Slug.eq(slug))
        .one(db)
        .await?)
}

/// Transition into `importing`/`pending` at the start of an import run.
/// Resetting the sync status matters on re-import: a previously errored
/// collection must not broadcast `error` throughout enumeration.
pub async fn begin_import(
    db: &DatabaseConnection,
    collection: CollectionModel,
) -> Result<CollectionModel, StoreError> {
    let mut active = collection.into_active_model();
    active.import_status = Set(ImportStatus::Importing);
    active.sync_status = Set(SyncStatus::Pending);
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

/// Mark enumeration finished: `completed`/`syncing`. The collection stays
/// `syncing` until the status tracker observes every project synced.
pub async fn complete_import(
    db: &DatabaseConnection,
    collection: CollectionModel,
) -> Result<CollectionModel, StoreError> {
    let mut active = collection.into_active_model();
    active.import_status = Set(ImportStatus::Completed);
    active.sync_status = Set(SyncStatus::Syncing);
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

/// Record a fatal import error: both statuses to `error`, diagnostics kept.
pub async fn record_import_error(
    db: &DatabaseConnection,
    collection: CollectionModel,
    message: &str,
    backtrace: Option<String>,
) -> Result<CollectionModel, StoreError> {
    let now = Utc::now().fixed_offset();
    let mut active = collection.into_active_model();
    active.import_status = Set(ImportStatus::Error);
    active.sync_status = Set(SyncStatus::Error);
    active.last_error_message = Set(Some(message.to_string()));
    active.last_error_backtrace = Set(backtrace);
    active.last_errored_at = Set(Some(now));
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

pub async fn set_collection_sync_status(
    db: &DatabaseConnection,
    collection: CollectionModel,
    status: SyncStatus,
) -> Result<CollectionModel, StoreError> {
    let mut active = collection.into_active_model();
    active.sync_status = Set(status);
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

/// Collections currently in `syncing` state that hold an active link to the
/// given project. These are the observers a finished project sync notifies.
pub async fn syncing_collections_for_project(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<Vec<CollectionModel>, StoreError> {
    let collections = Collection::find()
        .join(
            JoinType::InnerJoin,
            crate::entity::collection::Relation::CollectionProject.def(),
        )
        .filter(CollectionProjectColumn::ProjectId.eq(project_id))
        .filter(CollectionProjectColumn::RemovedAt.is_null())
        .filter(CollectionColumn::SyncStatus.eq(SyncStatus::Syncing))
        .distinct()
        .all(db)
        .await?;
    Ok(collections)
}
