//! Per-project entity sync engine.
//!
//! Pulls repository, package, readme, tag, advisory, issue, commit,
//! dependency and funding data for one project. Each sub-resource fetch is
//! independently fault-isolated: a failure is recorded as a soft error and
//! later steps still run.

mod engine;
mod funding;
mod progress;
mod types;

pub use engine::sync_project;
pub use funding::{FUNDING_DOMAINS, FundingInfo, collect_funding_links, extract_funding_links};
pub use progress::{ProgressCallback, SyncProgress};
pub use types::{
    FORK_STAR_THRESHOLD, FRESH_WINDOW_HOURS, MAX_PACKAGE_PAGES, MAX_RESOURCE_PAGES, SyncOptions,
    SyncOutcome, SyncOutcomeKind,
};
