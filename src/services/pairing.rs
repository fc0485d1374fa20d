// SPDX-License-Identifier: MIT

//! Activity-to-visit pairing engine.
//!
//! Takes unlinked monitoring activities, extracts an onsen name from the
//! activity title, finds visits near the activity start time, and scores
//! each candidate on name similarity and temporal proximity. Each activity
//! lands in exactly one bucket: auto-linked, needs-review, or no-match.
//! Extraction or scoring falling flat is a normal no-match, never an error;
//! unmatched titles are expected.

use crate::config::PairingConfig;
use crate::error::Result;
use crate::models::{
    Activity, ActivityLinkStore, AutoLinked, NeedsReview, PairingReport, ScoredCandidate, Visit,
    VisitLookup,
};
use chrono::Duration;

/// Tolerance for threshold comparisons. A combined score that is
/// mathematically exactly at a threshold must not fall on the wrong side of
/// it through float rounding of the weighted sum.
const SCORE_EPS: f64 = 1e-9;

/// How one activity was classified.
#[derive(Debug)]
enum Outcome {
    AutoLink(ScoredCandidate),
    Review(Vec<ScoredCandidate>),
    NoMatch,
}

/// The pairing engine. Stateless apart from its configuration; running it
/// twice over the same inputs produces identical buckets and scores.
pub struct PairingEngine {
    config: PairingConfig,
}

impl PairingEngine {
    pub fn new(config: PairingConfig) -> Self {
        Self { config }
    }

    /// Pair every unlinked monitoring activity in `store`, applying
    /// auto-links one at a time so an activity never ends up with more than
    /// one visit.
    pub fn pair_all(
        &self,
        store: &mut dyn ActivityLinkStore,
        visits: &dyn VisitLookup,
    ) -> Result<PairingReport> {
        let mut report = PairingReport::default();

        for activity in store.unlinked_monitoring()? {
            // Already-linked or non-monitoring records appear in no bucket.
            if !activity.is_pairable() {
                continue;
            }

            match self.classify(&activity, visits)? {
                Outcome::AutoLink(best) => {
                    store.set_link(activity.id, best.visit_id)?;
                    tracing::info!(
                        activity_id = activity.id,
                        visit_id = best.visit_id,
                        onsen = %best.onsen_name,
                        score = best.combined_score,
                        "Auto-linked activity to visit"
                    );
                    report.auto_linked.push(AutoLinked {
                        activity,
                        visit_id: best.visit_id,
                        onsen_name: best.onsen_name,
                        score: best.combined_score,
                    });
                }
                Outcome::Review(candidates) => {
                    tracing::info!(
                        activity_id = activity.id,
                        candidates = candidates.len(),
                        "Activity needs manual review"
                    );
                    report.needs_review.push(NeedsReview {
                        activity,
                        candidates,
                    });
                }
                Outcome::NoMatch => {
                    tracing::debug!(activity_id = activity.id, "No matching visit");
                    report.no_match.push(activity);
                }
            }
        }

        let (auto, review, none) = report.summary();
        tracing::info!(auto, review, none, "Pairing run complete");
        Ok(report)
    }

    /// Classify one activity against the visits near its start time.
    fn classify(&self, activity: &Activity, visits: &dyn VisitLookup) -> Result<Outcome> {
        // No extractable name means no candidates at all, not low scores.
        let Some(name) = extract_onsen_name(&activity.name) else {
            return Ok(Outcome::NoMatch);
        };

        let half_window = Duration::minutes((self.config.window_hours * 60.0) as i64);
        let nearby = visits.visits_between(
            activity.start_time - half_window,
            activity.start_time + half_window,
        )?;

        let mut candidates: Vec<ScoredCandidate> = nearby
            .iter()
            .map(|visit| self.score(activity, &name, visit))
            .filter(|c| c.combined_score >= self.config.review_threshold - SCORE_EPS)
            .collect();

        candidates.sort_by(|a, b| {
            b.combined_score
                .total_cmp(&a.combined_score)
                .then(a.time_diff_minutes.cmp(&b.time_diff_minutes))
                .then(a.visit_id.cmp(&b.visit_id))
        });
        candidates.truncate(self.config.max_candidates);

        if candidates.is_empty() {
            return Ok(Outcome::NoMatch);
        }
        if candidates[0].combined_score >= self.config.auto_link_threshold - SCORE_EPS {
            return Ok(Outcome::AutoLink(candidates.swap_remove(0)));
        }
        Ok(Outcome::Review(candidates))
    }

    /// Score one visit as a candidate for `activity`.
    fn score(&self, activity: &Activity, extracted_name: &str, visit: &Visit) -> ScoredCandidate {
        let name_similarity = name_similarity(extracted_name, &visit.onsen_name);
        let time_diff_minutes =
            crate::time_utils::abs_diff_minutes(activity.start_time, visit.visit_time);
        let time_score =
            (1.0 - time_diff_minutes as f64 / (self.config.window_hours * 60.0)).max(0.0);
        let combined_score =
            self.config.name_weight * name_similarity + self.config.time_weight * time_score;

        ScoredCandidate {
            visit_id: visit.id,
            onsen_name: visit.onsen_name.clone(),
            name_similarity,
            time_diff_minutes,
            combined_score,
        }
    }
}

/// Extract the onsen name from a free-text activity title.
///
/// Titles commonly embed the native onsen name in a trailing parenthesized
/// segment, e.g. `"Onsendo 9/88 - Ebisuya onsen (湯屋えびす)"`. The content
/// of the LAST parenthesized pair wins. Without parens, the text after the
/// first `-` is used, with a trailing "onsen" suffix stripped. `None` when
/// neither pattern yields anything non-empty.
pub fn extract_onsen_name(title: &str) -> Option<String> {
    if let Some(inner) = last_parenthesized(title) {
        let inner = inner.trim();
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
    }

    let after_dash = title.split_once('-')?.1.trim();
    let stripped = strip_onsen_suffix(after_dash).trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Content of the last parenthesized segment, accepting ASCII `()` and
/// fullwidth `（）`.
fn last_parenthesized(title: &str) -> Option<&str> {
    let mut last = None;
    let mut open: Option<usize> = None;

    for (idx, ch) in title.char_indices() {
        match ch {
            '(' | '（' => open = Some(idx + ch.len_utf8()),
            ')' | '）' => {
                if let Some(start) = open.take() {
                    last = Some(&title[start..idx]);
                }
            }
            _ => {}
        }
    }
    last
}

/// Remove a trailing case-insensitive "onsen" word, if present.
fn strip_onsen_suffix(name: &str) -> &str {
    const SUFFIX: &str = "onsen";
    let trimmed = name.trim_end();
    if trimmed.len() >= SUFFIX.len() {
        // `get` refuses non-boundary splits, which covers multibyte endings
        if let Some(tail) = trimmed.get(trimmed.len() - SUFFIX.len()..) {
            if tail.eq_ignore_ascii_case(SUFFIX) {
                return &trimmed[..trimmed.len() - SUFFIX.len()];
            }
        }
    }
    trimmed
}

/// Name similarity in [0, 1].
///
/// Both names are lowercased and whitespace-normalized; an exact match is
/// 1.0, otherwise `2·LCS / (|a| + |b|)` over Unicode scalar values. Partial
/// matches in the same script land in (0, 1) proportional to the overlap;
/// disjoint scripts share no characters and score 0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let lcs = lcs_length(&a_chars, &b_chars);
    2.0 * lcs as f64 / (a_chars.len() + b_chars.len()) as f64
}

/// Lowercase, trim, and collapse internal whitespace runs to single spaces.
fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest common subsequence length, O(|a|·|b|) with a rolling row.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
