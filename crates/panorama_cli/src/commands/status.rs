use panorama::status;
use panorama::store;

use crate::commands::shared;
use crate::config::Config;

/// Print a collection's import/sync status and aggregate progress.
pub(crate) async fn handle_status(
    config: &Config,
    database_url: &str,
    slug: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = shared::build_runtime(config, database_url).await?;

    let Some(collection) = store::find_collection_by_slug(&runtime.ctx.db, slug).await? else {
        return Err(format!("no collection with slug '{slug}'").into());
    };

    let counts = status::progress(&runtime.ctx.db, collection.id).await?;
    println!("{} ({})", collection.name, collection.slug);
    println!("  import: {}", collection.import_status);
    println!("  sync:   {}", collection.sync_status);
    println!("  progress: {} of {} projects synced", counts.synced, counts.total);
    if let Some(message) = &collection.last_error_message {
        println!("  last error: {message}");
        if let Some(at) = collection.last_errored_at {
            println!("  errored at: {at}");
        }
    }
    Ok(())
}
