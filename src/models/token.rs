// SPDX-License-Identifier: MIT

//! OAuth token model, persisted as JSON.

use serde::{Deserialize, Serialize};

/// Seconds before `expires_at` at which a token is already treated as expired.
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

/// A Strava OAuth token pair.
///
/// Created by the authorization-code exchange, replaced wholesale by every
/// refresh. `expires_at` is epoch seconds, exactly as Strava reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    /// True when `now >= expires_at - skew`.
    ///
    /// The skew makes sure a token that is about to lapse mid-request is
    /// refreshed up front instead of bouncing off a 401.
    pub fn is_expired_at(&self, now_epoch: i64, skew_secs: i64) -> bool {
        now_epoch >= self.expires_at - skew_secs
    }

    /// [`Self::is_expired_at`] against the wall clock with the default skew.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(crate::time_utils::epoch_now(), DEFAULT_EXPIRY_SKEW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_at: i64) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            token_type: "Bearer".to_string(),
        }
    }

    #[test]
    fn test_expired_exactly_at_skew_boundary() {
        let t = token(1_000_060);
        // now == expires_at - skew is already expired
        assert!(t.is_expired_at(1_000_000, 60));
        assert!(!t.is_expired_at(999_999, 60));
    }

    #[test]
    fn test_fresh_token_not_expired() {
        let t = token(2_000_000);
        assert!(!t.is_expired_at(1_000_000, 60));
    }

    #[test]
    fn test_token_type_defaults_on_deserialize() {
        let json = r#"{"access_token":"a","refresh_token":"r","expires_at":123}"#;
        let t: OAuthToken = serde_json::from_str(json).unwrap();
        assert_eq!(t.token_type, "Bearer");
    }
}
