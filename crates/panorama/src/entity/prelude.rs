//! Common re-exports for convenient entity usage.

pub use super::advisory::{
    ActiveModel as AdvisoryActiveModel, Column as AdvisoryColumn, Entity as Advisory,
    Model as AdvisoryModel,
};
pub use super::collection::{
    ActiveModel as CollectionActiveModel, Column as CollectionColumn, Entity as Collection,
    Model as CollectionModel,
};
pub use super::collection_project::{
    ActiveModel as CollectionProjectActiveModel, Column as CollectionProjectColumn,
    Entity as CollectionProject, Model as CollectionProjectModel,
};
pub use super::commit::{
    ActiveModel as CommitActiveModel, Column as CommitColumn, Entity as Commit,
    Model as CommitModel,
};
pub use super::issue::{
    ActiveModel as IssueActiveModel, Column as IssueColumn, Entity as Issue, Model as IssueModel,
};
pub use super::package::{
    ActiveModel as PackageActiveModel, Column as PackageColumn, Entity as Package,
    Model as PackageModel,
};
pub use super::project::{
    ActiveModel as ProjectActiveModel, Column as ProjectColumn, Entity as Project,
    Model as ProjectModel,
};
pub use super::sbom::{
    ActiveModel as SbomActiveModel, Column as SbomColumn, Entity as Sbom, Model as SbomModel,
};
pub use super::statuses::{ImportStatus, SyncStatus};
pub use super::tag::{
    ActiveModel as TagActiveModel, Column as TagColumn, Entity as Tag, Model as TagModel,
};
