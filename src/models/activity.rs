// SPDX-License-Identifier: MIT

//! Strava activity model and list filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the journal classifies an imported activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    /// Heart-rate recording made during an onsen visit.
    Monitoring,
    /// Regular training activity (run, ride, hike, ...).
    Exercise,
    /// Anything else.
    Other,
}

/// An imported activity as the journal stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID
    pub id: u64,
    /// Activity name/title as entered on Strava
    pub name: String,
    /// Journal-side classification
    pub category: ActivityCategory,
    /// Activity start time
    pub start_time: DateTime<Utc>,
    /// Sport type as reported by Strava (Ride, Run, Workout, ...)
    pub sport_type: String,
    /// Distance in meters
    pub distance_meters: f64,
    /// Whether the recording carries heart-rate samples
    pub has_heartrate: bool,
    /// Visit this activity is linked to, if any. At most one at a time.
    pub linked_visit_id: Option<u64>,
}

impl Activity {
    /// True for activities the pairing engine will even look at.
    pub fn is_pairable(&self) -> bool {
        self.category == ActivityCategory::Monitoring && self.linked_visit_id.is_none()
    }
}

/// Filter for [`crate::services::catalog::ActivityCatalogClient::list_activities`].
///
/// Strava's list endpoint only understands the time window and pagination;
/// the remaining fields are applied client-side to the returned page.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Only activities starting after this instant
    pub after: Option<DateTime<Utc>>,
    /// Only activities starting before this instant
    pub before: Option<DateTime<Utc>>,
    /// Exact sport type, e.g. "Workout"
    pub sport_type: Option<String>,
    /// Minimum distance in meters
    pub min_distance_meters: Option<f64>,
    /// Only activities with heart-rate samples
    pub with_heartrate: Option<bool>,
    /// 1-based page number (defaults to 1)
    pub page: Option<u32>,
    /// Page size, clamped to [`MAX_PER_PAGE`]
    pub per_page: Option<u32>,
}

/// Strava's hard cap on `per_page`.
pub const MAX_PER_PAGE: u32 = 200;

impl ActivityFilter {
    /// Page size after clamping, defaulting to 30 like the provider does.
    pub fn effective_per_page(&self) -> u32 {
        self.per_page.unwrap_or(30).clamp(1, MAX_PER_PAGE)
    }

    /// Apply the client-side fields to one summary record.
    pub fn matches(&self, summary: &ActivitySummary) -> bool {
        if let Some(sport_type) = &self.sport_type {
            if &summary.sport_type != sport_type {
                return false;
            }
        }
        if let Some(min) = self.min_distance_meters {
            if summary.distance < min {
                return false;
            }
        }
        if let Some(wants_hr) = self.with_heartrate {
            if summary.has_heartrate != wants_hr {
                return false;
            }
        }
        true
    }
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySummary {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    pub distance: f64,
    #[serde(default)]
    pub has_heartrate: bool,
}

/// Detailed activity from the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityDetail {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    pub distance: f64,
    #[serde(default)]
    pub has_heartrate: bool,
    pub description: Option<String>,
    pub device_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(sport: &str, distance: f64, hr: bool) -> ActivitySummary {
        ActivitySummary {
            id: 1,
            name: "test".to_string(),
            sport_type: sport.to_string(),
            start_date: Utc::now(),
            distance,
            has_heartrate: hr,
        }
    }

    #[test]
    fn test_per_page_clamped_to_provider_max() {
        let filter = ActivityFilter {
            per_page: Some(500),
            ..ActivityFilter::default()
        };
        assert_eq!(filter.effective_per_page(), MAX_PER_PAGE);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ActivityFilter::default();
        assert!(filter.matches(&summary("Ride", 0.0, false)));
    }

    #[test]
    fn test_filter_by_sport_type_and_distance() {
        let filter = ActivityFilter {
            sport_type: Some("Workout".to_string()),
            min_distance_meters: Some(100.0),
            ..ActivityFilter::default()
        };
        assert!(filter.matches(&summary("Workout", 150.0, false)));
        assert!(!filter.matches(&summary("Workout", 50.0, false)));
        assert!(!filter.matches(&summary("Ride", 150.0, false)));
    }

    #[test]
    fn test_filter_by_heartrate_presence() {
        let filter = ActivityFilter {
            with_heartrate: Some(true),
            ..ActivityFilter::default()
        };
        assert!(filter.matches(&summary("Workout", 0.0, true)));
        assert!(!filter.matches(&summary("Workout", 0.0, false)));
    }

    #[test]
    fn test_linked_activity_not_pairable() {
        let activity = Activity {
            id: 7,
            name: "Onsendo 1/88 - Takegawara onsen".to_string(),
            category: ActivityCategory::Monitoring,
            start_time: Utc::now(),
            sport_type: "Workout".to_string(),
            distance_meters: 0.0,
            has_heartrate: true,
            linked_visit_id: Some(3),
        };
        assert!(!activity.is_pairable());
    }
}
