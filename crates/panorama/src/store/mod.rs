//! Persistence operations over the entity layer.
//!
//! Everything here follows the same rule: mutate by natural key so that
//! re-running any sync or import operation updates in place instead of
//! duplicating rows.

mod children;
mod collections;
mod errors;
mod links;
mod projects;

pub use children::{
    count_packages, find_package_by_purl, upsert_advisory, upsert_commit, upsert_issue,
    upsert_package, upsert_tag,
};
pub use collections::{
    NewCollection, begin_import, complete_import, create_collection, find_collection,
    find_collection_by_slug, record_import_error, set_collection_sync_status,
    syncing_collections_for_project,
};
pub use errors::StoreError;
pub use links::{
    add_project_to_collection, count_collection_projects, count_synced_collection_projects,
    remove_project_from_collection,
};
pub use projects::{delete_project, find_or_create_project, find_project_by_url, normalize_url};
