//! Funding link resolution.
//!
//! Funding signals come from four places: the repository metadata funding
//! block, the owning account's GitHub Sponsors listing flag, package funding
//! metadata, and links scraped out of the README against a domain allowlist.

use crate::entity::prelude::PackageModel;

/// Domains accepted when scraping funding links out of README text.
pub const FUNDING_DOMAINS: [&str; 9] = [
    "github.com/sponsors",
    "opencollective.com",
    "patreon.com",
    "tidelift.com",
    "ko-fi.com",
    "liberapay.com",
    "paypal.me",
    "buymeacoffee.com",
    "thanks.dev",
];

/// Resolved funding metadata for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundingInfo {
    /// First discovered Open Collective account URL, if any.
    pub collective_url: Option<String>,
    /// Whether the owning account has a GitHub Sponsors listing.
    pub github_sponsors: bool,
    /// All discovered funding links, deduplicated in discovery order.
    pub links: Vec<String>,
}

/// Scrape allowlisted funding links out of README text.
pub fn extract_funding_links(readme: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    for (start, _) in readme.match_indices("https://") {
        let rest = &readme[start..];
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, ')' | ']' | '"' | '\'' | '>' | '<'))
            .unwrap_or(rest.len());
        let mut candidate = &rest[..end];
        candidate = candidate.trim_end_matches(['.', ',', ';', ':', '!', '?']);

        if FUNDING_DOMAINS.iter().any(|d| candidate.contains(d))
            && !links.iter().any(|seen| seen == candidate)
        {
            links.push(candidate.to_string());
        }
    }

    links
}

/// Combine all funding signals for a project into one [`FundingInfo`].
pub fn collect_funding_links(
    repo_metadata: &serde_json::Value,
    packages: &[PackageModel],
    readme: Option<&str>,
) -> FundingInfo {
    let mut links: Vec<String> = Vec::new();
    let mut push = |link: &str| {
        let trimmed = link.trim();
        if !trimmed.is_empty() && !links.iter().any(|seen| seen == trimmed) {
            links.push(trimmed.to_string());
        }
    };

    collect_from_value(repo_metadata.get("funding"), &mut push);
    for package in packages {
        collect_from_value(package.funding.as_ref(), &mut push);
    }
    if let Some(text) = readme {
        for link in extract_funding_links(text) {
            push(&link);
        }
    }

    let collective_url = links
        .iter()
        .find(|link| link.contains("opencollective.com"))
        .cloned();

    let metadata_flag = repo_metadata
        .get("owner_record")
        .and_then(|o| o.get("has_sponsors_listing"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let github_sponsors = metadata_flag
        || links
            .iter()
            .any(|link| link.contains("github.com/sponsors"));

    FundingInfo {
        collective_url,
        github_sponsors,
        links,
    }
}

// Funding blocks come in several shapes: a bare URL string, an array of
// URLs, or a platform→handle map the way GitHub's FUNDING.yml serializes.
fn collect_from_value(value: Option<&serde_json::Value>, push: &mut impl FnMut(&str)) {
    let Some(value) = value else { return };
    match value {
        serde_json::Value::String(url) => push(url),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_from_value(Some(item), push);
            }
        }
        serde_json::Value::Object(map) => {
            for (platform, handle) in map {
                match handle {
                    serde_json::Value::String(h) => {
                        if let Some(url) = platform_url(platform, h) {
                            push(&url);
                        }
                    }
                    other => collect_from_value(Some(other), push),
                }
            }
        }
        _ => {}
    }
}

fn platform_url(platform: &str, handle: &str) -> Option<String> {
    if handle.starts_with("https://") {
        return Some(handle.to_string());
    }
    match platform {
        "github" => Some(format!("https://github.com/sponsors/{handle}")),
        "open_collective" => Some(format!("https://opencollective.com/{handle}")),
        "patreon" => Some(format!("https://patreon.com/{handle}")),
        "ko_fi" => Some(format!("https://ko-fi.com/{handle}")),
        "liberapay" => Some(format!("https://liberapay.com/{handle}")),
        "tidelift" => Some(format!("https://tidelift.com/funding/github/{handle}")),
        "buy_me_a_coffee" => Some(format!("https://buymeacoffee.com/{handle}")),
        "custom" => Some(handle.to_string()).filter(|h| h.starts_with("http")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_funding_links_applies_the_domain_allowlist() {
        let readme = "\
            Support us at https://opencollective.com/rails! \
            Docs at https://guides.rubyonrails.org/ and \
            [sponsor](https://github.com/sponsors/rails). \
            Tips welcome at https://ko-fi.com/rails?";
        let links = extract_funding_links(readme);
        assert_eq!(
            links,
            vec![
                "https://opencollective.com/rails",
                "https://github.com/sponsors/rails",
                "https://ko-fi.com/rails",
            ]
        );
    }

    #[test]
    fn collect_funding_links_reads_the_metadata_funding_block() {
        let metadata = json!({
            "funding": {"github": "rails", "open_collective": "rails"},
            "owner_record": {"has_sponsors_listing": true},
        });
        let info = collect_funding_links(&metadata, &[], None);
        assert!(info.github_sponsors);
        assert_eq!(
            info.collective_url.as_deref(),
            Some("https://opencollective.com/rails")
        );
        assert_eq!(info.links.len(), 2);
    }

    #[test]
    fn sponsors_flag_follows_discovered_links_without_metadata() {
        let info = collect_funding_links(
            &json!({}),
            &[],
            Some("see https://github.com/sponsors/rails"),
        );
        assert!(info.github_sponsors);
    }

    #[test]
    fn duplicate_links_across_sources_collapse() {
        let metadata = json!({"funding": "https://opencollective.com/rails"});
        let info = collect_funding_links(
            &metadata,
            &[],
            Some("donate: https://opencollective.com/rails"),
        );
        assert_eq!(info.links, vec!["https://opencollective.com/rails"]);
    }
}
