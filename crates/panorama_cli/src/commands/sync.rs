use panorama::store;
use panorama::sync::{self, ProgressCallback, SyncOptions, SyncOutcomeKind};

use crate::commands::shared;
use crate::config::Config;
use crate::progress::LoggingReporter;

/// Sync one project by URL, creating it on first reference.
pub(crate) async fn handle_sync(
    config: &Config,
    database_url: &str,
    url: &str,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = shared::build_runtime(config, database_url).await?;

    let project = store::find_or_create_project(&runtime.ctx.db, url).await?;

    let reporter = LoggingReporter::new();
    let callback: ProgressCallback = Box::new(move |event| reporter.handle(event));

    let outcome = sync::sync_project(
        &runtime.ctx,
        project.id,
        &SyncOptions {
            force,
            job_id: None,
        },
        Some(&callback),
    )
    .await?;

    match outcome.kind {
        SyncOutcomeKind::Fresh => {
            println!("Project is fresh; use --force to sync anyway.");
        }
        SyncOutcomeKind::DuplicateRemoved => {
            println!("Project URL resolved to an existing project; duplicate removed.");
        }
        SyncOutcomeKind::Completed => {
            println!(
                "Synced {} packages, {} issues, {} commits, {} tags, {} advisories.",
                outcome.packages,
                outcome.issues,
                outcome.commits,
                outcome.tags,
                outcome.advisories
            );
            if !outcome.soft_errors.is_empty() {
                println!("{} step(s) failed softly:", outcome.soft_errors.len());
                for error in &outcome.soft_errors {
                    println!("  - {error}");
                }
            }
        }
    }
    Ok(())
}
