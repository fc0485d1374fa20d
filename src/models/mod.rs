// SPDX-License-Identifier: MIT

//! Data models for the sync core.

pub mod activity;
pub mod pairing;
pub mod streams;
pub mod token;
pub mod visit;

pub use activity::{Activity, ActivityCategory, ActivityDetail, ActivityFilter, ActivitySummary};
pub use pairing::{AutoLinked, NeedsReview, PairingReport, ScoredCandidate};
pub use streams::{StreamKey, StreamSet};
pub use token::OAuthToken;
pub use visit::{ActivityLinkStore, Visit, VisitLookup};
