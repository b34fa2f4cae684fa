//! SeaORM entity definitions for the panorama database schema.

pub mod advisory;
pub mod collection;
pub mod collection_project;
pub mod commit;
pub mod issue;
pub mod package;
pub mod prelude;
pub mod project;
pub mod sbom;
pub mod statuses;
pub mod tag;
