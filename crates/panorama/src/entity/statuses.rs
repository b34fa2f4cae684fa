//! Status enums for collections and projects.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sync lifecycle for a project or collection.
///
/// `pending → syncing → ready`, with `error` reachable from any state.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "syncing")]
    Syncing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "error")]
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Ready => write!(f, "ready"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Import lifecycle for a collection.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "importing")]
    Importing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "error")]
    Error,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportStatus::Pending => write!(f, "pending"),
            ImportStatus::Importing => write!(f, "importing"),
            ImportStatus::Completed => write!(f, "completed"),
            ImportStatus::Error => write!(f, "error"),
        }
    }
}
