// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Everything except the Strava OAuth credentials has a sensible default, so
//! a `.env` file with `STRAVA_CLIENT_ID` and `STRAVA_CLIENT_SECRET` is enough
//! to run the sync core.

use std::env;
use std::path::PathBuf;

/// Strava app rate limits for a non-upgraded application.
const DEFAULT_SHORT_LIMIT: u32 = 100;
const DEFAULT_SHORT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_DAILY_LIMIT: u32 = 1000;
const DEFAULT_DAILY_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Loopback port the OAuth redirect URI points at
    pub oauth_redirect_port: u16,
    /// Seconds to wait for the browser callback before giving up
    pub oauth_timeout_secs: u64,
    /// Where the token JSON is persisted
    pub token_path: PathBuf,
    /// Rate limiter settings
    pub rate_limits: RateLimitConfig,
    /// Pairing engine settings
    pub pairing: PairingConfig,
}

/// Dual-window rate limit settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub short_limit: u32,
    pub short_window_secs: u64,
    pub daily_limit: u32,
    pub daily_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            short_limit: DEFAULT_SHORT_LIMIT,
            short_window_secs: DEFAULT_SHORT_WINDOW_SECS,
            daily_limit: DEFAULT_DAILY_LIMIT,
            daily_window_secs: DEFAULT_DAILY_WINDOW_SECS,
        }
    }
}

/// Pairing engine settings.
///
/// `name_weight + time_weight` must sum to 1; [`Config::from_env`] rejects
/// anything else.
#[derive(Debug, Clone, Copy)]
pub struct PairingConfig {
    /// Half-width of the visit search window around the activity start
    pub window_hours: f64,
    /// Weight of name similarity in the combined score
    pub name_weight: f64,
    /// Weight of temporal proximity in the combined score
    pub time_weight: f64,
    /// Combined score at or above which an activity is linked automatically
    pub auto_link_threshold: f64,
    /// Combined score below which a candidate is dropped
    pub review_threshold: f64,
    /// Maximum candidates carried into manual review
    pub max_candidates: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            window_hours: 4.0,
            name_weight: 0.6,
            time_weight: 0.4,
            auto_link_threshold: 0.8,
            review_threshold: 0.6,
            max_candidates: 5,
        }
    }
}

impl PairingConfig {
    /// Check that the score weights form a convex combination.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (self.name_weight + self.time_weight - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights {
                name_weight: self.name_weight,
                time_weight: self.time_weight,
            });
        }
        if self.window_hours <= 0.0 {
            return Err(ConfigError::Invalid("PAIRING_WINDOW_HOURS must be positive"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let pairing = PairingConfig {
            window_hours: parse_env("PAIRING_WINDOW_HOURS", 4.0)?,
            name_weight: parse_env("PAIRING_NAME_WEIGHT", 0.6)?,
            time_weight: parse_env("PAIRING_TIME_WEIGHT", 0.4)?,
            auto_link_threshold: parse_env("PAIRING_AUTO_LINK_THRESHOLD", 0.8)?,
            review_threshold: parse_env("PAIRING_REVIEW_THRESHOLD", 0.6)?,
            max_candidates: parse_env("PAIRING_MAX_CANDIDATES", 5)?,
        };
        pairing.validate()?;

        let rate_limits = RateLimitConfig {
            short_limit: parse_env("STRAVA_RATE_LIMIT_15MIN", DEFAULT_SHORT_LIMIT)?,
            short_window_secs: DEFAULT_SHORT_WINDOW_SECS,
            daily_limit: parse_env("STRAVA_RATE_LIMIT_DAILY", DEFAULT_DAILY_LIMIT)?,
            daily_window_secs: DEFAULT_DAILY_WINDOW_SECS,
        };

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            oauth_redirect_port: parse_env("OAUTH_REDIRECT_PORT", 8723)?,
            oauth_timeout_secs: parse_env("OAUTH_TIMEOUT_SECS", 300)?,
            token_path: env::var("STRAVA_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_token_path()),
            rate_limits,
            pairing,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            oauth_redirect_port: 8723,
            oauth_timeout_secs: 300,
            token_path: std::env::temp_dir().join("onsendo-sync-test-token.json"),
            rate_limits: RateLimitConfig::default(),
            pairing: PairingConfig::default(),
        }
    }

    /// Redirect URI registered with the Strava application.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.oauth_redirect_port)
    }
}

/// Token file lives under the user config dir, falling back to CWD when the
/// platform has none.
fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onsendo")
        .join("strava_token.json")
}

/// Parse an env var, falling back to `default` when unset.
fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Unparseable(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Could not parse environment variable: {0}")]
    Unparseable(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),

    #[error("Score weights must sum to 1 (name={name_weight}, time={time_weight})")]
    InvalidWeights { name_weight: f64, time_weight: f64 },
}
