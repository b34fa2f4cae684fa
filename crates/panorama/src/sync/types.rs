use uuid::Uuid;

/// A project fully synced within this many hours is treated as fresh and the
/// sync is a no-op.
pub const FRESH_WINDOW_HOURS: i64 = 24;

/// Page cap for issue/commit/tag/advisory pagination loops.
pub const MAX_RESOURCE_PAGES: u32 = 50;

/// Page cap for package registry listings, which are far smaller.
pub const MAX_PACKAGE_PAGES: u32 = 10;

/// A fork at or below this star count, with no packages and not archived, is
/// skipped for deep resource sync.
pub const FORK_STAR_THRESHOLD: i32 = 10;

/// Options for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Sync even when the project is inside the freshness window.
    pub force: bool,
    /// Background-job correlation id, stamped on the project row for the
    /// duration of the run.
    pub job_id: Option<Uuid>,
}

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcomeKind {
    /// Project was synced recently; nothing was done.
    Fresh,
    /// Full run completed (possibly with soft errors).
    Completed,
    /// URL canonicalization collided with an existing project; this row was
    /// removed and the run aborted.
    DuplicateRemoved,
}

/// Summary of one sync run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub kind: SyncOutcomeKind,
    pub packages: usize,
    pub issues: usize,
    pub commits: usize,
    pub tags: usize,
    pub advisories: usize,
    /// Step failures that did not abort the run.
    pub soft_errors: Vec<String>,
    pub skipped_low_value_fork: bool,
}

impl SyncOutcome {
    pub(crate) fn empty(kind: SyncOutcomeKind) -> Self {
        Self {
            kind,
            packages: 0,
            issues: 0,
            commits: 0,
            tags: 0,
            advisories: 0,
            soft_errors: Vec::new(),
            skipped_low_value_fork: false,
        }
    }
}
