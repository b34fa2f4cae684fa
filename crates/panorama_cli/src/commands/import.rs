use std::path::PathBuf;

use panorama::import;
use panorama::store::{self, NewCollection};

use crate::commands::shared;
use crate::config::Config;

pub(crate) struct ImportArgs {
    pub slug: String,
    pub name: Option<String>,
    pub github_org: Option<String>,
    pub collective: Option<String>,
    pub repo: Option<String>,
    pub sbom_file: Option<PathBuf>,
}

/// Create the collection if it does not exist, import it, and run the
/// scheduled sync jobs inline.
pub(crate) async fn handle_import(
    config: &Config,
    database_url: &str,
    args: ImportArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = shared::build_runtime(config, database_url).await?;

    let dependency_file = match &args.sbom_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };

    let collection = match store::find_collection_by_slug(&runtime.ctx.db, &args.slug).await? {
        Some(existing) => {
            println!("Using existing collection '{}'.", existing.slug);
            existing
        }
        None => {
            let created = store::create_collection(
                &runtime.ctx.db,
                NewCollection {
                    slug: args.slug.clone(),
                    name: args.name.clone().unwrap_or_else(|| args.slug.clone()),
                    github_organization_url: args.github_org.clone(),
                    collective_url: args.collective.clone(),
                    repository_url: args.repo.clone(),
                    dependency_file,
                },
            )
            .await?;
            println!("Created collection '{}'.", created.slug);
            created
        }
    };

    let summary = import::import_collection(&runtime.ctx, collection.id).await?;
    println!(
        "Discovered {} projects, scheduled {} syncs.",
        summary.discovered, summary.scheduled
    );

    shared::drain_jobs(&runtime).await;

    let counts = panorama::status::progress(&runtime.ctx.db, collection.id).await?;
    println!("Synced {} of {} projects.", counts.synced, counts.total);
    Ok(())
}
