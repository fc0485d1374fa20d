// SPDX-License-Identifier: MIT

//! Services module - the sync core's working parts.

pub mod catalog;
pub mod oauth;
pub mod pairing;
pub mod token;
pub mod transport;

pub use catalog::ActivityCatalogClient;
pub use oauth::{AuthState, OAuthAuthorizer};
pub use pairing::{extract_onsen_name, name_similarity, PairingEngine};
pub use token::{FileTokenStorage, TokenManager, TokenStorage};
pub use transport::{RateLimitedTransport, RateLimiter};

use crate::error::{Result, SyncError};
use std::time::Duration;

/// Default per-request timeout for every HTTP client in the crate.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build a reqwest client with a request timeout; no client in this crate
/// goes without one, so no network path can block indefinitely.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Network(format!("HTTP client init failed: {}", e)))
}
