//! Import source detection.

use thiserror::Error;

use crate::entity::prelude::CollectionModel;
use crate::gateway::GatewayError;
use crate::sbom::SbomError;
use crate::store::StoreError;

/// Fatal import failures. These set the collection to `error` state and
/// propagate to the job runner so its retry policy can apply.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("collection has no import source")]
    NoSource,

    #[error(transparent)]
    Sbom(#[from] SbomError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upstream error: {0}")]
    Gateway(#[from] GatewayError),
}

/// The resolved import source for a collection.
///
/// When more than one source field is populated, detection follows fixed
/// precedence: GitHub organization, then collective, then single repository,
/// then uploaded dependency file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionSource {
    GithubOrganization(String),
    Collective(String),
    Repository(String),
    DependencyFile(String),
}

impl CollectionSource {
    pub fn detect(collection: &CollectionModel) -> Option<Self> {
        if let Some(url) = &collection.github_organization_url {
            return Some(CollectionSource::GithubOrganization(url.clone()));
        }
        if let Some(url) = &collection.collective_url {
            return Some(CollectionSource::Collective(url.clone()));
        }
        if let Some(url) = &collection.repository_url {
            return Some(CollectionSource::Repository(url.clone()));
        }
        collection
            .dependency_file
            .as_ref()
            .map(|raw| CollectionSource::DependencyFile(raw.clone()))
    }
}

/// Extract the organization login from a GitHub organization URL.
pub fn organization_name(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains('.'))
}
