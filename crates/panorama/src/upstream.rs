//! Upstream metadata service routes and response shapes.
//!
//! Each aggregation concern (repositories, packages, issues, commits,
//! advisories, collectives, archives) lives on its own service with paginated
//! JSON collection endpoints and lookup-by-URL endpoints. Base URLs are
//! configurable so tests can point everything at a mock transport.

use serde::{Deserialize, Serialize};
use urlencoding::encode;

/// Items per page requested from paginated collection endpoints.
pub const PER_PAGE: usize = 100;

/// Base URLs for the upstream metadata services.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub repos_base: String,
    pub packages_base: String,
    pub issues_base: String,
    pub commits_base: String,
    pub advisories_base: String,
    pub collectives_base: String,
    pub archives_base: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repos_base: "https://repos.ecosyste.ms".to_string(),
            packages_base: "https://packages.ecosyste.ms".to_string(),
            issues_base: "https://issues.ecosyste.ms".to_string(),
            commits_base: "https://commits.ecosyste.ms".to_string(),
            advisories_base: "https://advisories.ecosyste.ms".to_string(),
            collectives_base: "https://opencollective.ecosyste.ms".to_string(),
            archives_base: "https://archives.ecosyste.ms".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Single-repository lookup by URL. Follows renames/redirects upstream,
    /// so the response `url` is the canonical repository URL.
    pub fn repository_lookup(&self, repo_url: &str) -> String {
        format!(
            "{}/api/v1/repositories/lookup?url={}",
            self.repos_base,
            encode(repo_url)
        )
    }

    /// Paginated repository listing for an organization (100/page).
    pub fn organization_repositories(&self, org: &str, page: u32) -> String {
        format!(
            "{}/api/v1/hosts/GitHub/owners/{}/repositories?page={}&per_page={}",
            self.repos_base, org, page, PER_PAGE
        )
    }

    /// Paginated package listing for a repository URL.
    pub fn repository_packages(&self, repo_url: &str, page: u32) -> String {
        format!(
            "{}/api/v1/packages/lookup?repository_url={}&page={}&per_page={}",
            self.packages_base,
            encode(repo_url),
            page,
            PER_PAGE
        )
    }

    /// Single-package lookup by PURL.
    pub fn package_lookup(&self, purl: &str) -> String {
        format!(
            "{}/api/v1/packages/lookup?purl={}",
            self.packages_base,
            encode(purl)
        )
    }

    /// Paginated issue (and pull request) listing for a repository URL.
    pub fn repository_issues(&self, repo_url: &str, page: u32) -> String {
        format!(
            "{}/api/v1/issues/lookup?url={}&page={}&per_page={}",
            self.issues_base,
            encode(repo_url),
            page,
            PER_PAGE
        )
    }

    /// Paginated commit listing for a repository URL.
    pub fn repository_commits(&self, repo_url: &str, page: u32) -> String {
        format!(
            "{}/api/v1/commits/lookup?url={}&page={}&per_page={}",
            self.commits_base,
            encode(repo_url),
            page,
            PER_PAGE
        )
    }

    /// Paginated tag listing for a repository URL.
    pub fn repository_tags(&self, repo_url: &str, page: u32) -> String {
        format!(
            "{}/api/v1/tags/lookup?url={}&page={}&per_page={}",
            self.repos_base,
            encode(repo_url),
            page,
            PER_PAGE
        )
    }

    /// Paginated advisory listing for a repository URL.
    pub fn repository_advisories(&self, repo_url: &str, page: u32) -> String {
        format!(
            "{}/api/v1/advisories?repository_url={}&page={}&per_page={}",
            self.advisories_base,
            encode(repo_url),
            page,
            PER_PAGE
        )
    }

    /// Dependency manifest graph for a repository URL.
    pub fn repository_manifests(&self, repo_url: &str) -> String {
        format!(
            "{}/api/v1/repositories/manifests?url={}",
            self.repos_base,
            encode(repo_url)
        )
    }

    /// SBOM document for a repository URL (repo + SBOM import source).
    pub fn repository_sbom(&self, repo_url: &str) -> String {
        format!(
            "{}/api/v1/repositories/sbom?url={}",
            self.repos_base,
            encode(repo_url)
        )
    }

    /// Project listing for an Open Collective account (not paginated).
    pub fn collective_projects(&self, collective_url: &str) -> String {
        format!(
            "{}/api/v1/collectives/lookup?url={}",
            self.collectives_base,
            encode(collective_url)
        )
    }

    /// README content lookup from the registry archive service.
    pub fn readme_archive(&self, repo_url: &str, filename: &str) -> String {
        format!(
            "{}/api/v1/archives/contents?url={}&path={}",
            self.archives_base,
            encode(repo_url),
            encode(filename)
        )
    }

    /// Raw-content fallback for a GitHub-hosted README.
    pub fn raw_readme(&self, full_name: &str) -> String {
        format!("https://raw.githubusercontent.com/{full_name}/HEAD/README.md")
    }

    /// Best-effort ping endpoints told that a repository was (re)synced.
    pub fn ping_urls(&self, repo_url: &str) -> Vec<String> {
        vec![
            format!(
                "{}/api/v1/repositories/ping?url={}",
                self.repos_base,
                encode(repo_url)
            ),
            format!(
                "{}/api/v1/packages/ping?repository_url={}",
                self.packages_base,
                encode(repo_url)
            ),
        ]
    }
}

// ─── Response shapes ─────────────────────────────────────────────────────────
//
// All fields default so a sparse upstream document never fails the decode;
// missing numerics are the documented zero/absent policies.

/// Repository metadata snapshot from the repository service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryInfo {
    pub url: Option<String>,
    pub full_name: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub homepage: Option<String>,
    pub stargazers_count: Option<i32>,
    pub forks_count: Option<i32>,
    pub archived: bool,
    pub fork: bool,
    pub license: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub pushed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Detected readme filename, owner sponsor listing flag, funding block,
    /// and other service-specific extras.
    pub metadata: serde_json::Value,
}

/// Package registry entry for a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageInfo {
    pub ecosystem: String,
    pub name: String,
    pub purl: Option<String>,
    pub licenses: Option<String>,
    pub downloads: Option<i64>,
    pub dependent_repos_count: Option<i64>,
    pub repository_url: Option<String>,
    pub funding: Option<serde_json::Value>,
    pub rankings: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
}

/// Issue or pull request from the issue service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueInfo {
    pub number: i32,
    pub title: Option<String>,
    pub state: Option<String>,
    pub pull_request: bool,
    pub user: Option<String>,
    pub labels: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub closed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Commit from the commit service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitInfo {
    pub sha: String,
    pub message: Option<String>,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub merge: bool,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

/// Tag/release from the repository service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagInfo {
    pub name: String,
    pub sha: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Security advisory from the advisory service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryInfo {
    pub uuid: String,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub identifiers: Vec<String>,
}

/// One dependency manifest (lockfile or declared-dependency file).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestInfo {
    pub filepath: Option<String>,
    pub kind: Option<String>,
    pub dependencies: Vec<DependencyInfo>,
}

/// One dependency entry inside a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyInfo {
    pub package_name: String,
    pub ecosystem: Option<String>,
    pub requirements: Option<String>,
    /// "runtime", "development", etc.
    pub kind: Option<String>,
    pub direct: bool,
}

/// Repository entry from the organization listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgRepositoryInfo {
    pub full_name: Option<String>,
    pub html_url: Option<String>,
}

impl OrgRepositoryInfo {
    /// Prefer the explicit html_url; fall back to constructing from the name.
    pub fn repository_url(&self) -> Option<String> {
        if let Some(url) = &self.html_url {
            return Some(url.clone());
        }
        self.full_name
            .as_ref()
            .map(|full| format!("https://github.com/{full}"))
    }
}

/// Collective lookup response: the account plus its tracked projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveInfo {
    pub url: Option<String>,
    pub projects: Vec<CollectiveProjectInfo>,
}

/// One project tracked by a collective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveProjectInfo {
    pub repository_url: Option<String>,
    pub url: Option<String>,
}

impl CollectiveProjectInfo {
    pub fn repository_url(&self) -> Option<String> {
        self.repository_url.clone().or_else(|| self.url.clone())
    }
}

/// README archive lookup response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveContents {
    pub contents: Option<String>,
}
