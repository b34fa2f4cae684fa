//! Panorama - sync pipeline for an open-source project metadata dashboard.
//!
//! This library aggregates project metadata (repositories, packages, issues,
//! commits, tags, advisories, dependencies, funding) from external metadata
//! APIs, stores it relationally, and tracks the progress of collection-wide
//! imports so dashboards can observe them live.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//!
//! # Example
//!
//! ```ignore
//! use panorama::{connect_and_migrate, context::AppContext, sync};
//!
//! let db = connect_and_migrate("sqlite://panorama.db?mode=rwc").await?;
//! let ctx = AppContext::new(db, gateway, queue, broadcaster);
//!
//! // Sync a single project end to end.
//! let outcome = sync::sync_project(&ctx, project_id, &Default::default(), None).await?;
//! ```

pub mod context;
pub mod db;
pub mod entity;
pub mod gateway;
pub mod http;
pub mod import;
pub mod jobs;
pub mod sbom;
pub mod status;
pub mod store;
pub mod sync;
pub mod upstream;

#[cfg(feature = "migrate")]
pub mod migration;

pub use context::AppContext;
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use gateway::{ApiGateway, GatewayError};
pub use store::StoreError;
