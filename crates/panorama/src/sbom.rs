//! SBOM parsing and PURL resolution.
//!
//! Handles both CycloneDX and SPDX documents, detected by their top-level
//! marker fields. Extraction produces package URLs (PURLs); resolution maps
//! each PURL to a canonical project repository URL via local package lookup
//! first, then a remote package-lookup API fallback. A single PURL that fails
//! to resolve is skipped, never aborting the rest.

use sea_orm::{DatabaseConnection, EntityTrait};
use thiserror::Error;

use crate::gateway::ApiGateway;
use crate::store;
use crate::upstream::{PackageInfo, UpstreamConfig};

#[derive(Debug, Error)]
pub enum SbomError {
    /// Document was not valid JSON or not a recognized SBOM format. The
    /// message is surfaced to collection error state verbatim.
    #[error("Invalid SBOM file format: {0}")]
    Format(String),
}

/// Parse raw uploaded document text into JSON.
pub fn parse_document(raw: &str) -> Result<serde_json::Value, SbomError> {
    serde_json::from_str(raw).map_err(|e| SbomError::Format(e.to_string()))
}

/// Strip the version (and any qualifiers) from a PURL.
///
/// `pkg:gem/rails@7.0.0` becomes `pkg:gem/rails`. The version separator is
/// the last `@` so unencoded npm scopes survive.
pub fn strip_purl_version(purl: &str) -> String {
    let without_qualifiers = match purl.split_once('?') {
        Some((base, _)) => base,
        None => purl,
    };
    match without_qualifiers.rfind('@') {
        // Position 0 would be a bare "@..."; not a version separator.
        Some(pos) if pos > 0 => without_qualifiers[..pos].to_string(),
        _ => without_qualifiers.to_string(),
    }
}

/// Extract PURLs from a parsed SBOM document, deduplicated in first-seen
/// order.
///
/// CycloneDX is detected by `bomFormat == "CycloneDX"` and contributes
/// `components[].purl`; SPDX is detected by the presence of `spdxVersion`
/// and contributes each package's `externalRefs` entries whose
/// `referenceType` is `purl`.
pub fn extract_purls(document: &serde_json::Value) -> Result<Vec<String>, SbomError> {
    let mut purls: Vec<String> = Vec::new();
    let mut push = |purl: &str| {
        if !purls.iter().any(|seen| seen == purl) {
            purls.push(purl.to_string());
        }
    };

    if document.get("bomFormat").and_then(|v| v.as_str()) == Some("CycloneDX") {
        if let Some(components) = document.get("components").and_then(|v| v.as_array()) {
            for component in components {
                if let Some(purl) = component.get("purl").and_then(|v| v.as_str()) {
                    push(purl);
                }
            }
        }
    } else if document.get("spdxVersion").is_some() {
        if let Some(packages) = document.get("packages").and_then(|v| v.as_array()) {
            for package in packages {
                let Some(refs) = package.get("externalRefs").and_then(|v| v.as_array()) else {
                    continue;
                };
                for external_ref in refs {
                    if external_ref.get("referenceType").and_then(|v| v.as_str()) != Some("purl") {
                        continue;
                    }
                    if let Some(purl) = external_ref
                        .get("referenceLocator")
                        .and_then(|v| v.as_str())
                    {
                        push(purl);
                    }
                }
            }
        }
    } else {
        return Err(SbomError::Format(
            "document is neither CycloneDX nor SPDX".to_string(),
        ));
    }

    Ok(purls)
}

/// Construct a GitHub repository URL directly from a `pkg:github/...` PURL.
///
/// A single path segment is assumed to be an action under the `actions`
/// owner (`pkg:github/checkout@v4` is `actions/checkout`).
pub fn github_repo_url(purl: &str) -> Option<String> {
    let stripped = strip_purl_version(purl);
    let path = stripped.strip_prefix("pkg:github/")?;
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = segments.next()?;
    match segments.next() {
        Some(repo) => Some(format!("https://github.com/{first}/{repo}")),
        None => Some(format!("https://github.com/actions/{first}")),
    }
}

/// Resolve PURLs to project repository URLs.
///
/// For each PURL, in order: local package-by-PURL lookup (version-stripped),
/// then direct construction for the `github` scheme, then the remote
/// package-lookup API. Failures are logged and skipped. Output is
/// deduplicated preserving discovery order.
pub async fn resolve_to_project_urls(
    db: &DatabaseConnection,
    gateway: &ApiGateway,
    upstream: &UpstreamConfig,
    purls: &[String],
) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: String| {
        let normalized = store::normalize_url(&url);
        if !normalized.is_empty() && !urls.iter().any(|seen| *seen == normalized) {
            urls.push(normalized);
        }
    };

    for purl in purls {
        match resolve_one(db, gateway, upstream, purl).await {
            Ok(Some(url)) => push(url),
            Ok(None) => {
                tracing::debug!(purl, "no repository URL found for PURL");
            }
            Err(message) => {
                tracing::warn!(purl, error = %message, "skipping unresolvable PURL");
            }
        }
    }

    urls
}

async fn resolve_one(
    db: &DatabaseConnection,
    gateway: &ApiGateway,
    upstream: &UpstreamConfig,
    purl: &str,
) -> Result<Option<String>, String> {
    // Local lookup first: a known package gives us the URL without any
    // remote call.
    if let Some(package) = store::find_package_by_purl(db, purl)
        .await
        .map_err(|e| e.to_string())?
    {
        if let Some(url) = package.repository_url.clone() {
            return Ok(Some(url));
        }
        if let Some(project) =
            crate::entity::prelude::Project::find_by_id(package.project_id)
                .one(db)
                .await
                .map_err(|e| e.to_string())?
        {
            return Ok(Some(project.url));
        }
    }

    if let Some(url) = github_repo_url(purl) {
        return Ok(Some(url));
    }

    let lookup = upstream.package_lookup(purl);
    let found: Option<PackageInfo> = gateway
        .get_json_opt(&lookup)
        .await
        .map_err(|e| e.to_string())?;
    Ok(found.and_then(|info| info.repository_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_purl_version_handles_versions_and_qualifiers() {
        assert_eq!(strip_purl_version("pkg:gem/rails@7.0.0"), "pkg:gem/rails");
        assert_eq!(strip_purl_version("pkg:gem/rails"), "pkg:gem/rails");
        assert_eq!(
            strip_purl_version("pkg:npm/@babel/core@7.20.0"),
            "pkg:npm/@babel/core"
        );
        assert_eq!(
            strip_purl_version("pkg:maven/org.apache/log4j@2.17?type=jar"),
            "pkg:maven/org.apache/log4j"
        );
    }

    #[test]
    fn extract_purls_reads_cyclonedx_components_in_order() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "components": [
                {"purl": "pkg:gem/rails@7.0.0"},
                {"purl": "pkg:npm/react@18.0.0"},
            ],
        });
        let purls = extract_purls(&doc).expect("cyclonedx extraction");
        assert_eq!(purls, vec!["pkg:gem/rails@7.0.0", "pkg:npm/react@18.0.0"]);
    }

    #[test]
    fn extract_purls_ignores_non_purl_spdx_refs() {
        let doc = json!({
            "spdxVersion": "SPDX-2.3",
            "packages": [
                {
                    "externalRefs": [
                        {"referenceType": "cpe23Type", "referenceLocator": "cpe:2.3:a:x"},
                        {"referenceType": "purl", "referenceLocator": "pkg:gem/rails@7.0.0"},
                    ],
                },
                {
                    "externalRefs": [
                        {"referenceType": "purl", "referenceLocator": "pkg:npm/react@18.0.0"},
                    ],
                },
            ],
        });
        let purls = extract_purls(&doc).expect("spdx extraction");
        assert_eq!(purls, vec!["pkg:gem/rails@7.0.0", "pkg:npm/react@18.0.0"]);
    }

    #[test]
    fn extract_purls_deduplicates_preserving_first_seen_order() {
        let doc = json!({
            "bomFormat": "CycloneDX",
            "components": [
                {"purl": "pkg:npm/react@18.0.0"},
                {"purl": "pkg:gem/rails@7.0.0"},
                {"purl": "pkg:npm/react@18.0.0"},
            ],
        });
        let purls = extract_purls(&doc).expect("cyclonedx extraction");
        assert_eq!(purls, vec!["pkg:npm/react@18.0.0", "pkg:gem/rails@7.0.0"]);
    }

    #[test]
    fn extract_purls_rejects_unknown_formats() {
        let err = extract_purls(&json!({"hello": "world"})).expect_err("unknown format");
        assert!(err.to_string().contains("Invalid SBOM file format"));
    }

    #[test]
    fn github_purls_resolve_without_lookup() {
        assert_eq!(
            github_repo_url("pkg:github/owner/repo@v1.0.0").as_deref(),
            Some("https://github.com/owner/repo")
        );
        // Single segment is an action.
        assert_eq!(
            github_repo_url("pkg:github/checkout@v4").as_deref(),
            Some("https://github.com/actions/checkout")
        );
        assert!(github_repo_url("pkg:gem/rails@7.0.0").is_none());
    }

    #[test]
    fn parse_document_surfaces_invalid_json_as_format_error() {
        let err = parse_document("{not json").expect_err("invalid json");
        assert!(err.to_string().starts_with("Invalid SBOM file format"));
    }
}
