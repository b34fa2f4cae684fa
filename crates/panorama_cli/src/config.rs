//! Configuration file support for panorama.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `PANORAMA_`, e.g., `PANORAMA_DATABASE_URL`)
//! 3. Config file (~/.config/panorama/config.toml or ./panorama.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/panorama/panorama.db"  # optional, this is the default
//!
//! [upstream]
//! repos_base = "https://repos.ecosyste.ms"
//! packages_base = "https://packages.ecosyste.ms"
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use panorama::upstream::UpstreamConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Upstream metadata service base URLs.
    pub upstream: UpstreamSection,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL. Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/panorama/panorama.db` if not set.
    pub url: Option<String>,
}

/// Optional overrides for the upstream service base URLs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    pub repos_base: Option<String>,
    pub packages_base: Option<String>,
    pub issues_base: Option<String>,
    pub commits_base: Option<String>,
    pub advisories_base: Option<String>,
    pub collectives_base: Option<String>,
    pub archives_base: Option<String>,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "panorama") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("panorama.toml");
        if local_config.exists() {
            tracing::debug!("loading config from ./panorama.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("PANORAMA")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("panorama.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Resolve the effective upstream config, applying any overrides.
    pub fn upstream(&self) -> UpstreamConfig {
        let mut upstream = UpstreamConfig::default();
        if let Some(base) = &self.upstream.repos_base {
            upstream.repos_base = base.clone();
        }
        if let Some(base) = &self.upstream.packages_base {
            upstream.packages_base = base.clone();
        }
        if let Some(base) = &self.upstream.issues_base {
            upstream.issues_base = base.clone();
        }
        if let Some(base) = &self.upstream.commits_base {
            upstream.commits_base = base.clone();
        }
        if let Some(base) = &self.upstream.advisories_base {
            upstream.advisories_base = base.clone();
        }
        if let Some(base) = &self.upstream.collectives_base {
            upstream.collectives_base = base.clone();
        }
        if let Some(base) = &self.upstream.archives_base {
            upstream.archives_base = base.clone();
        }
        upstream
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/panorama` or `~/.local/state/panorama`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "panorama").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
