// SPDX-License-Identifier: MIT

//! Pairing result types.

use crate::models::Activity;
use serde::Serialize;

/// A visit considered as a link target for one activity.
///
/// Transient: produced per pairing attempt, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub visit_id: u64,
    pub onsen_name: String,
    /// Name similarity in [0, 1]
    pub name_similarity: f64,
    /// Absolute start-time difference in minutes
    pub time_diff_minutes: i64,
    /// Weighted blend of name and time scores, in [0, 1]
    pub combined_score: f64,
}

/// An activity linked automatically to its single best candidate.
#[derive(Debug, Clone)]
pub struct AutoLinked {
    pub activity: Activity,
    pub visit_id: u64,
    pub onsen_name: String,
    pub score: f64,
}

/// An activity with plausible candidates that need a human decision.
#[derive(Debug, Clone)]
pub struct NeedsReview {
    pub activity: Activity,
    /// Ranked best-first; never empty.
    pub candidates: Vec<ScoredCandidate>,
}

/// The three disjoint outcome buckets of one pairing run.
#[derive(Debug, Default)]
pub struct PairingReport {
    pub auto_linked: Vec<AutoLinked>,
    pub needs_review: Vec<NeedsReview>,
    pub no_match: Vec<Activity>,
}

impl PairingReport {
    /// Per-bucket counts: (auto-linked, needs-review, no-match).
    pub fn summary(&self) -> (usize, usize, usize) {
        (
            self.auto_linked.len(),
            self.needs_review.len(),
            self.no_match.len(),
        )
    }

    /// Total activities that produced any outcome.
    pub fn total(&self) -> usize {
        self.auto_linked.len() + self.needs_review.len() + self.no_match.len()
    }
}
