// SPDX-License-Identifier: MIT

//! Visit read model and the journal-side collaborator interfaces.
//!
//! The journal database (locations, visits, onsens) lives outside this crate;
//! the pairing engine only sees it through these traits.

use crate::error::Result;
use crate::models::Activity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded onsen visit, read-only from the pairing engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: u64,
    pub onsen_name: String,
    pub visit_time: DateTime<Utc>,
}

/// Lookup of visits by time range.
pub trait VisitLookup {
    /// All visits with `visit_time` in `[from, to]`.
    fn visits_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Visit>>;
}

/// The journal's activity store, as seen by the pairing engine.
pub trait ActivityLinkStore {
    /// Monitoring-category activities with no linked visit.
    fn unlinked_monitoring(&self) -> Result<Vec<Activity>>;

    /// Link an activity to a visit. Replaces any previous link so an
    /// activity never holds more than one.
    fn set_link(&mut self, activity_id: u64, visit_id: u64) -> Result<()>;
}
