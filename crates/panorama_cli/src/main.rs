//! Panorama CLI - command-line interface for the project metadata sync
//! pipeline.

mod commands;
mod config;
mod progress;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "panorama")]
#[command(version)]
#[command(about = "Sync pipeline for an open-source project metadata dashboard")]
#[command(
    long_about = "Panorama imports collections of open-source projects from GitHub \
organizations, Open Collective accounts, repositories or uploaded SBOM files, and keeps \
their metadata (packages, issues, commits, tags, advisories, dependencies, funding) \
synced from upstream metadata services."
)]
#[command(after_long_help = r#"EXAMPLES
    Create and import a collection from a GitHub organization:
        $ panorama import --slug rails --name "Rails" --github-org https://github.com/rails

    Import a collection from an uploaded SBOM file:
        $ panorama import --slug app --name "My App" --sbom-file ./bom.json

    Sync a single project by URL:
        $ panorama sync https://github.com/rails/rails --force

    Show a collection's sync progress:
        $ panorama status rails

CONFIGURATION
    Panorama reads configuration from:
      1. ~/.config/panorama/config.toml (or $XDG_CONFIG_HOME/panorama/config.toml)
      2. ./panorama.toml
      3. Environment variables (PANORAMA_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    PANORAMA_DATABASE_URL     Database connection string (default: ~/.local/state/panorama/panorama.db)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Create a collection (if needed) and import it from its source
    Import {
        /// URL-safe collection slug
        #[arg(long)]
        slug: String,

        /// Human-readable collection name (defaults to the slug)
        #[arg(long)]
        name: Option<String>,

        /// GitHub organization URL to import from
        #[arg(long, group = "source")]
        github_org: Option<String>,

        /// Open Collective account URL to import from
        #[arg(long, group = "source")]
        collective: Option<String>,

        /// Single repository URL, expanded via its SBOM
        #[arg(long, group = "source")]
        repo: Option<String>,

        /// Path to an SBOM / dependency file to upload
        #[arg(long, group = "source")]
        sbom_file: Option<std::path::PathBuf>,
    },
    /// Sync a single project by repository URL
    Sync {
        /// Repository URL (the project is created on first reference)
        url: String,

        /// Sync even if the project was synced within the last 24 hours
        #[arg(short, long)]
        force: bool,
    },
    /// Show a collection's import/sync status and progress
    Status {
        /// Collection slug
        slug: String,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("panorama=info,panorama_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = config::Config::load();
    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("failed to determine database URL")?;

    // Ensure the database directory exists for SQLite.
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Import {
            slug,
            name,
            github_org,
            collective,
            repo,
            sbom_file,
        } => {
            commands::import::handle_import(
                &config,
                &database_url,
                commands::import::ImportArgs {
                    slug,
                    name,
                    github_org,
                    collective,
                    repo,
                    sbom_file,
                },
            )
            .await?;
        }
        Commands::Sync { url, force } => {
            commands::sync::handle_sync(&config, &database_url, &url, force).await?;
        }
        Commands::Status { slug } => {
            commands::status::handle_status(&config, &database_url, &slug).await?;
        }
    }

    Ok(())
}
