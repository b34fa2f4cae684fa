//! Initial migration to create the panorama database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_projects(manager).await?;
        self.create_collections(manager).await?;
        self.create_collection_projects(manager).await?;
        self.create_packages(manager).await?;
        self.create_issues(manager).await?;
        self.create_commits(manager).await?;
        self.create_tags(manager).await?;
        self.create_advisories(manager).await?;
        self.create_sboms(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Sboms::Table.into_table_ref(),
            Advisories::Table.into_table_ref(),
            Tags::Table.into_table_ref(),
            Commits::Table.into_table_ref(),
            Issues::Table.into_table_ref(),
            Packages::Table.into_table_ref(),
            CollectionProjects::Table.into_table_ref(),
            Collections::Table.into_table_ref(),
            Projects::Table.into_table_ref(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}

impl Migration {
    async fn create_projects(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::Url).text().not_null())
                    // Repository snapshot
                    .col(ColumnDef::new(Projects::FullName).string().null())
                    .col(ColumnDef::new(Projects::Owner).string().null())
                    .col(ColumnDef::new(Projects::Description).text().null())
                    .col(ColumnDef::new(Projects::Language).string().null())
                    .col(ColumnDef::new(Projects::Homepage).text().null())
                    .col(ColumnDef::new(Projects::Stars).integer().null())
                    .col(ColumnDef::new(Projects::Forks).integer().null())
                    .col(
                        ColumnDef::new(Projects::Archived)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Projects::Fork)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Projects::LicenseSpdx).string().null())
                    .col(
                        ColumnDef::new(Projects::RepoCreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::RepoUpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::RepoPushedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::RepoMetadata)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(ColumnDef::new(Projects::Readme).text().null())
                    // Dependency graph snapshot
                    .col(ColumnDef::new(Projects::Dependencies).json().null())
                    // Funding
                    .col(ColumnDef::new(Projects::CollectiveUrl).text().null())
                    .col(
                        ColumnDef::new(Projects::GithubSponsors)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Projects::FundingLinks)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    // Sync tracking
                    .col(
                        ColumnDef::new(Projects::IssuesLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::CommitsLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::PackagesLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::TagsLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::DependenciesLastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::SyncStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Projects::SyncJobId).uuid().null())
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-projects-url")
                    .table(Projects::Table)
                    .col(Projects::Url)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_collections(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Collections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Collections::Slug).string().not_null())
                    .col(ColumnDef::new(Collections::Name).string().not_null())
                    // Import source (one of)
                    .col(
                        ColumnDef::new(Collections::GithubOrganizationUrl)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Collections::CollectiveUrl).text().null())
                    .col(ColumnDef::new(Collections::RepositoryUrl).text().null())
                    .col(ColumnDef::new(Collections::DependencyFile).text().null())
                    // Lifecycle
                    .col(
                        ColumnDef::new(Collections::ImportStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Collections::SyncStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Collections::LastErrorMessage).text().null())
                    .col(
                        ColumnDef::new(Collections::LastErrorBacktrace)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Collections::LastErroredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Collections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Collections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-collections-slug")
                    .table(Collections::Table)
                    .col(Collections::Slug)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_collection_projects(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CollectionProjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CollectionProjects::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CollectionProjects::CollectionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectionProjects::ProjectId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectionProjects::RemovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CollectionProjects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CollectionProjects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collection_projects-collection")
                            .from(CollectionProjects::Table, CollectionProjects::CollectionId)
                            .to(Collections::Table, Collections::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-collection_projects-project")
                            .from(CollectionProjects::Table, CollectionProjects::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per pair, tombstoned rows included: removal restores, never
        // re-inserts.
        manager
            .create_index(
                Index::create()
                    .name("idx-collection_projects-pair")
                    .table(CollectionProjects::Table)
                    .col(CollectionProjects::CollectionId)
                    .col(CollectionProjects::ProjectId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_packages(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Packages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Packages::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Packages::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Packages::Ecosystem).string().not_null())
                    .col(ColumnDef::new(Packages::Name).string().not_null())
                    .col(ColumnDef::new(Packages::Purl).string().null())
                    .col(ColumnDef::new(Packages::Licenses).string().null())
                    .col(
                        ColumnDef::new(Packages::Downloads)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Packages::DependentReposCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Packages::RepositoryUrl).text().null())
                    .col(ColumnDef::new(Packages::Funding).json().null())
                    .col(ColumnDef::new(Packages::Rankings).json().null())
                    .col(
                        ColumnDef::new(Packages::Metadata)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(Packages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Packages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-packages-project")
                            .from(Packages::Table, Packages::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-packages-natural-key")
                    .table(Packages::Table)
                    .col(Packages::ProjectId)
                    .col(Packages::Ecosystem)
                    .col(Packages::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_issues(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Issues::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Issues::Number).integer().not_null())
                    .col(ColumnDef::new(Issues::Title).text().null())
                    .col(ColumnDef::new(Issues::State).string().null())
                    .col(
                        ColumnDef::new(Issues::PullRequest)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Issues::User).string().null())
                    .col(
                        ColumnDef::new(Issues::Labels)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Issues::OpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAtUpstream)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::TimeToCloseSeconds)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-issues-project")
                            .from(Issues::Table, Issues::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-issues-natural-key")
                    .table(Issues::Table)
                    .col(Issues::ProjectId)
                    .col(Issues::Number)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_commits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Commits::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Commits::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Commits::Sha).string().not_null())
                    .col(ColumnDef::new(Commits::Message).text().null())
                    .col(ColumnDef::new(Commits::Author).string().null())
                    .col(ColumnDef::new(Commits::Committer).string().null())
                    .col(
                        ColumnDef::new(Commits::Merge)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Commits::CommittedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Commits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Commits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-commits-project")
                            .from(Commits::Table, Commits::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-commits-natural-key")
                    .table(Commits::Table)
                    .col(Commits::ProjectId)
                    .col(Commits::Sha)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_tags(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tags::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Tags::Name).string().not_null())
                    .col(ColumnDef::new(Tags::Sha).string().null())
                    .col(
                        ColumnDef::new(Tags::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tags::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-tags-project")
                            .from(Tags::Table, Tags::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tags-natural-key")
                    .table(Tags::Table)
                    .col(Tags::ProjectId)
                    .col(Tags::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_advisories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Advisories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Advisories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Advisories::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Advisories::Uuid).string().not_null())
                    .col(ColumnDef::new(Advisories::Title).text().null())
                    .col(ColumnDef::new(Advisories::Severity).string().null())
                    .col(
                        ColumnDef::new(Advisories::PublishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Advisories::Identifiers)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Advisories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Advisories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-advisories-project")
                            .from(Advisories::Table, Advisories::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-advisories-uuid")
                    .table(Advisories::Table)
                    .col(Advisories::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn create_sboms(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sboms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sboms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sboms::CollectionId).uuid().not_null())
                    .col(ColumnDef::new(Sboms::Raw).text().not_null())
                    .col(ColumnDef::new(Sboms::Converted).json().null())
                    .col(
                        ColumnDef::new(Sboms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-sboms-collection")
                            .from(Sboms::Table, Sboms::CollectionId)
                            .to(Collections::Table, Collections::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Url,
    FullName,
    Owner,
    Description,
    Language,
    Homepage,
    Stars,
    Forks,
    Archived,
    Fork,
    LicenseSpdx,
    RepoCreatedAt,
    RepoUpdatedAt,
    RepoPushedAt,
    RepoMetadata,
    Readme,
    Dependencies,
    CollectiveUrl,
    GithubSponsors,
    FundingLinks,
    IssuesLastSyncedAt,
    CommitsLastSyncedAt,
    PackagesLastSyncedAt,
    TagsLastSyncedAt,
    DependenciesLastSyncedAt,
    LastSyncedAt,
    SyncStatus,
    SyncJobId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Collections {
    Table,
    Id,
    Slug,
    Name,
    GithubOrganizationUrl,
    CollectiveUrl,
    RepositoryUrl,
    DependencyFile,
    ImportStatus,
    SyncStatus,
    LastErrorMessage,
    LastErrorBacktrace,
    LastErroredAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CollectionProjects {
    Table,
    Id,
    CollectionId,
    ProjectId,
    RemovedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Packages {
    Table,
    Id,
    ProjectId,
    Ecosystem,
    Name,
    Purl,
    Licenses,
    Downloads,
    DependentReposCount,
    RepositoryUrl,
    Funding,
    Rankings,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    ProjectId,
    Number,
    Title,
    State,
    PullRequest,
    User,
    Labels,
    OpenedAt,
    UpdatedAtUpstream,
    ClosedAt,
    TimeToCloseSeconds,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Commits {
    Table,
    Id,
    ProjectId,
    Sha,
    Message,
    Author,
    Committer,
    Merge,
    CommittedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    ProjectId,
    Name,
    Sha,
    PublishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Advisories {
    Table,
    Id,
    ProjectId,
    Uuid,
    Title,
    Severity,
    PublishedAt,
    Identifiers,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Sboms {
    Table,
    Id,
    CollectionId,
    Raw,
    Converted,
    CreatedAt,
}
