//! Bucket width planning
//!
//! Picks a bucket width from the length of the requested range so a chart
//! stays at a readable number of points (a few hundred at most) whatever the
//! range is.

use chrono::Duration;

use crate::models::BucketWidth;

/// One row of the policy table: spans shorter than `below_secs` use `width`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    /// Exclusive upper bound on the span, in seconds. `None` matches anything.
    pub below_secs: Option<i64>,
    /// Width to use for matching spans
    pub width: BucketWidth,
}

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;

/// Ordered policy table, first match wins
pub const DEFAULT_POLICY: &[PolicyEntry] = &[
    PolicyEntry {
        below_secs: Some(HOUR),
        width: BucketWidth::FIVE_MINUTES,
    },
    PolicyEntry {
        below_secs: Some(2 * DAY),
        width: BucketWidth::FIFTEEN_MINUTES,
    },
    PolicyEntry {
        below_secs: Some(7 * DAY),
        width: BucketWidth::ONE_HOUR,
    },
    PolicyEntry {
        below_secs: None,
        width: BucketWidth::ONE_DAY,
    },
];

/// Chooses bucket widths from a policy table
#[derive(Debug, Clone)]
pub struct BucketPlanner {
    policy: Vec<PolicyEntry>,
}

impl Default for BucketPlanner {
    fn default() -> Self {
        Self {
            policy: DEFAULT_POLICY.to_vec(),
        }
    }
}

impl BucketPlanner {
    /// Create a planner with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a planner with a custom policy.
    ///
    /// Entries are consulted in order. A trailing catch-all entry
    /// (`below_secs: None`) is expected; without one, spans past the last
    /// bound fall back to the last entry's width.
    pub fn with_policy(policy: Vec<PolicyEntry>) -> Self {
        if policy.is_empty() {
            return Self::default();
        }
        Self { policy }
    }

    /// The policy table in evaluation order
    pub fn policy(&self) -> &[PolicyEntry] {
        &self.policy
    }

    /// Pick the bucket width for a range of length `span`.
    ///
    /// Zero and negative spans get the finest width.
    pub fn plan(&self, span: Duration) -> BucketWidth {
        let secs = span.num_seconds().max(0);

        self.policy
            .iter()
            .find(|entry| entry.below_secs.map_or(true, |bound| secs < bound))
            .or_else(|| self.policy.last())
            .map_or(BucketWidth::FIVE_MINUTES, |entry| entry.width)
    }
}
