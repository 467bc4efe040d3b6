//! Digest aggregation: P0/P1 buckets for the periodic report.

use crate::issue::{Issue, Priority, RawIssue};

/// Issues of one digest run, split by priority.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportBuckets {
    /// Sorted by affected version (empty versions first), otherwise tracker order.
    pub p0: Vec<Issue>,
    /// Tracker order.
    pub p1: Vec<Issue>,
}

impl ReportBuckets {
    pub fn total(&self) -> usize {
        self.p0.len() + self.p1.len()
    }
}

/// Build the digest buckets.
///
/// This does not consult the issue cache; the digest may list issues that the
/// new-issue poll already published. Priorities other than exactly `P0` and
/// `P1` are dropped.
pub fn build_report(raw: Vec<RawIssue>) -> ReportBuckets {
    let mut buckets = ReportBuckets::default();
    for issue in raw.into_iter().map(Issue::from) {
        match issue.priority {
            Priority::P0 => buckets.p0.push(issue),
            Priority::P1 => buckets.p1.push(issue),
            Priority::Other(_) => {}
        }
    }

    // Jira's JQL ordering does not group by version; `sort_by` is stable.
    buckets
        .p0
        .sort_by(|a, b| a.affected_version.cmp(&b.affected_version));

    buckets
}
