// SPDX-License-Identifier: MIT

//! Strava activity catalog: list, detail, and stream fetches.

use crate::error::{Result, SyncError};
use crate::models::{ActivityDetail, ActivityFilter, ActivitySummary, StreamKey, StreamSet};
use crate::services::transport::RateLimitedTransport;

/// Versioned Strava API base.
pub const API_BASE: &str = "https://www.strava.com/api/v3";

/// Client for the activity endpoints, issuing everything through the
/// rate-limited transport.
pub struct ActivityCatalogClient {
    transport: RateLimitedTransport,
    base_url: String,
}

impl ActivityCatalogClient {
    pub fn new(transport: RateLimitedTransport) -> Self {
        Self {
            transport,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base (tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn transport(&self) -> &RateLimitedTransport {
        &self.transport
    }

    /// One page of activities matching `filter`.
    ///
    /// The time window and pagination go to the provider; sport type,
    /// minimum distance and heart-rate presence are filtered client-side
    /// because the list endpoint does not support them.
    pub async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivitySummary>> {
        let url = format!("{}/athlete/activities", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("page", filter.page.unwrap_or(1).to_string()),
            ("per_page", filter.effective_per_page().to_string()),
        ];
        if let Some(after) = filter.after {
            query.push(("after", after.timestamp().to_string()));
        }
        if let Some(before) = filter.before {
            query.push(("before", before.timestamp().to_string()));
        }

        let page: Vec<ActivitySummary> = self.transport.get_json(&url, &query).await?;
        let fetched = page.len();
        let matched: Vec<ActivitySummary> =
            page.into_iter().filter(|s| filter.matches(s)).collect();

        tracing::debug!(fetched, matched = matched.len(), "Listed activities");
        Ok(matched)
    }

    /// Walk pages until a short page, applying `filter` to each.
    pub async fn list_all_activities(&self, filter: &ActivityFilter) -> Result<Vec<ActivitySummary>> {
        let per_page = filter.effective_per_page();
        let mut all = Vec::new();
        let mut page_no = filter.page.unwrap_or(1);

        loop {
            let url = format!("{}/athlete/activities", self.base_url);
            let mut query: Vec<(&str, String)> = vec![
                ("page", page_no.to_string()),
                ("per_page", per_page.to_string()),
            ];
            if let Some(after) = filter.after {
                query.push(("after", after.timestamp().to_string()));
            }
            if let Some(before) = filter.before {
                query.push(("before", before.timestamp().to_string()));
            }

            let page: Vec<ActivitySummary> = self.transport.get_json(&url, &query).await?;
            let fetched = page.len() as u32;
            all.extend(page.into_iter().filter(|s| filter.matches(s)));

            if fetched < per_page {
                break;
            }
            page_no += 1;
        }

        tracing::info!(count = all.len(), "Listed all matching activities");
        Ok(all)
    }

    /// Detailed activity by ID. A 404 surfaces as [`SyncError::NotFound`].
    pub async fn get_activity(&self, activity_id: u64) -> Result<ActivityDetail> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.transport.get_json(&url, &[]).await.map_err(|e| match e {
            SyncError::NotFound(_) => SyncError::NotFound(format!("activity {}", activity_id)),
            other => other,
        })
    }

    /// Time-series streams for an activity, keyed by stream type.
    ///
    /// Arrays may have unequal lengths across keys; index through
    /// [`StreamSet::sample`] instead of assuming alignment.
    pub async fn get_streams(&self, activity_id: u64, keys: &[StreamKey]) -> Result<StreamSet> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let query = [
            ("keys", StreamKey::join(keys)),
            ("key_by_type", "true".to_string()),
        ];
        self.transport
            .get_json(&url, &query)
            .await
            .map_err(|e| match e {
                SyncError::NotFound(_) => {
                    SyncError::NotFound(format!("streams for activity {}", activity_id))
                }
                other => other,
            })
    }
}
