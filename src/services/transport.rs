// SPDX-License-Identifier: MIT

//! Rate-limited, token-aware HTTP transport for the Strava API.
//!
//! Every call goes through dual sliding windows (15-minute and daily)
//! mirroring Strava's app limits. A window at its limit fails the call fast
//! with the seconds until reset instead of queueing; the caller decides
//! whether to wait. Transient failures (timeout, connect, 5xx) are retried
//! with exponential backoff, a 401 triggers exactly one token refresh and
//! retry, and a 429 surfaces immediately with `Retry-After`.

use crate::config::RateLimitConfig;
use crate::error::{Result, SyncError};
use crate::models::OAuthToken;
use crate::services::token::TokenManager;
use crate::services::{http_client, REQUEST_TIMEOUT_SECS};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;

/// Maximum attempts for transient failures (timeout, connect error, 5xx).
const MAX_TRANSIENT_ATTEMPTS: u32 = 3;

/// One sliding rate-limit window.
///
/// `count` resets to 0 exactly when `now >= window_start + window_length`,
/// checked lazily on each use.
#[derive(Debug, Clone)]
pub struct RateLimitWindow {
    count: u32,
    window_start: DateTime<Utc>,
    window_length: ChronoDuration,
    limit: u32,
}

impl RateLimitWindow {
    pub fn new(limit: u32, window_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            window_length: ChronoDuration::seconds(window_secs as i64),
            limit,
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.window_start + self.window_length {
            self.count = 0;
            self.window_start = now;
        }
    }

    /// Whether another call fits, after rolling the window forward.
    fn check(&mut self, now: DateTime<Utc>) -> std::result::Result<(), u64> {
        self.roll(now);
        if self.count >= self.limit {
            let reset_at = self.window_start + self.window_length;
            let secs = (reset_at - now).num_seconds().max(0) as u64;
            return Err(secs);
        }
        Ok(())
    }

    fn record(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// The two independent windows checked before every network call.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    short: RateLimitWindow,
    daily: RateLimitWindow,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, now: DateTime<Utc>) -> Self {
        Self {
            short: RateLimitWindow::new(config.short_limit, config.short_window_secs, now),
            daily: RateLimitWindow::new(config.daily_limit, config.daily_window_secs, now),
        }
    }

    /// Check both windows and, if both admit the call, count it in both.
    ///
    /// Counts reflect actual network attempts: this runs once per attempt,
    /// retries included, and never when the check itself fails.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<()> {
        let short = self.short.check(now);
        let daily = self.daily.check(now);
        // A blocked window blocks the call; report the longer wait.
        match (short, daily) {
            (Ok(()), Ok(())) => {
                self.short.record();
                self.daily.record();
                Ok(())
            }
            (Err(a), Err(b)) => Err(SyncError::RateLimitExceeded {
                retry_after_secs: a.max(b),
            }),
            (Err(secs), Ok(())) | (Ok(()), Err(secs)) => {
                Err(SyncError::RateLimitExceeded { retry_after_secs: secs })
            }
        }
    }

    pub fn counts(&self) -> (u32, u32) {
        (self.short.count(), self.daily.count())
    }
}

/// HTTP transport wrapping every Strava call with rate limiting, token
/// handling and bounded retries.
pub struct RateLimitedTransport {
    http: reqwest::Client,
    tokens: TokenManager,
    limiter: Mutex<RateLimiter>,
    /// Serializes the check-then-refresh-then-retry sequence on 401 and the
    /// cached-token state; refresh-then-retry is not atomic without it.
    token_slot: Mutex<Option<OAuthToken>>,
}

impl RateLimitedTransport {
    pub fn new(tokens: TokenManager, limits: RateLimitConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?,
            tokens,
            limiter: Mutex::new(RateLimiter::new(limits, Utc::now())),
            token_slot: Mutex::new(None),
        })
    }

    /// Current window counts (short, daily), for logging.
    pub async fn rate_counts(&self) -> (u32, u32) {
        self.limiter.lock().await.counts()
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.execute(url, query).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Conversion(format!("JSON parse error: {}", e)))
    }

    /// GET `url` with retry, rate limiting and 401 refresh handling.
    pub async fn execute(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut access_token = self.valid_access_token().await?;
        let mut refreshed_once = false;
        let mut attempt: u32 = 0;

        loop {
            // Fail fast when either window is exhausted; no attempt is made
            // and nothing is counted.
            self.limiter.lock().await.try_acquire(Utc::now())?;

            let result = self
                .http
                .get(url)
                .bearer_auth(&access_token)
                .query(query)
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= MAX_TRANSIENT_ATTEMPTS {
                        return Err(SyncError::Network(format!(
                            "Request failed after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    tracing::warn!(url, attempt, delay_secs = delay.as_secs(), error = %e,
                        "Transient transport error, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(SyncError::Network(e.to_string())),
            };

            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            match status.as_u16() {
                429 => {
                    let retry_after_secs = parse_retry_after(&response).unwrap_or(60);
                    tracing::warn!(url, retry_after_secs, "Strava rate limit hit (429)");
                    return Err(SyncError::RateLimitExceeded { retry_after_secs });
                }
                401 => {
                    if refreshed_once {
                        return Err(SyncError::Authentication(
                            "Still unauthorized after token refresh".to_string(),
                        ));
                    }
                    tracing::info!(url, "401 from API, refreshing token and retrying once");
                    access_token = self.refresh_access_token().await?;
                    refreshed_once = true;
                    continue;
                }
                404 => {
                    return Err(SyncError::NotFound(url.to_string()));
                }
                s if (500..600).contains(&s) => {
                    attempt += 1;
                    if attempt >= MAX_TRANSIENT_ATTEMPTS {
                        let body = response.text().await.unwrap_or_default();
                        return Err(SyncError::Network(format!(
                            "HTTP {} after {} attempts: {}",
                            s, attempt, body
                        )));
                    }
                    let delay = backoff_delay(attempt);
                    tracing::warn!(url, status = s, attempt, delay_secs = delay.as_secs(),
                        "Server error, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                s => {
                    // Remaining 4xx are caller mistakes; retrying won't help.
                    let body = response.text().await.unwrap_or_default();
                    return Err(SyncError::Api { status: s, body });
                }
            }
        }
    }

    /// Cached access token, refreshed up front when expired.
    async fn valid_access_token(&self) -> Result<String> {
        let mut slot = self.token_slot.lock().await;

        if slot.is_none() {
            *slot = self.tokens.load()?;
        }
        let token = slot.clone().ok_or_else(|| {
            SyncError::Authentication("Not authenticated: run the authorization flow first".to_string())
        })?;

        if self.tokens.is_expired(&token) {
            let refreshed = self.tokens.refresh(&token).await?;
            let access = refreshed.access_token.clone();
            *slot = Some(refreshed);
            return Ok(access);
        }
        Ok(token.access_token)
    }

    /// Forced refresh after a 401, under the token critical section.
    async fn refresh_access_token(&self) -> Result<String> {
        let mut slot = self.token_slot.lock().await;
        let token = match slot.clone() {
            Some(t) => t,
            None => self.tokens.load()?.ok_or_else(|| {
                SyncError::Authentication("No token available to refresh".to_string())
            })?,
        };
        let refreshed = self.tokens.refresh(&token).await?;
        let access = refreshed.access_token.clone();
        *slot = Some(refreshed);
        Ok(access)
    }
}

/// Exponential backoff: 2^attempt seconds.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// `Retry-After` from a 429, in seconds.
fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap()
    }

    fn limiter(short_limit: u32, daily_limit: u32) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                short_limit,
                short_window_secs: 900,
                daily_limit,
                daily_window_secs: 86_400,
            },
            t0(),
        )
    }

    #[test]
    fn test_call_after_limit_fails_fast() {
        let mut limiter = limiter(3, 100);
        for _ in 0..3 {
            limiter.try_acquire(t0()).expect("under the limit");
        }
        let err = limiter.try_acquire(t0() + ChronoDuration::seconds(10));
        match err {
            Err(SyncError::RateLimitExceeded { retry_after_secs }) => {
                // 900s window started at t0, checked at t0+10
                assert_eq!(retry_after_secs, 890);
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other.err()),
        }
        // The blocked call was not counted
        assert_eq!(limiter.counts(), (3, 3));
    }

    #[test]
    fn test_window_resets_exactly_at_boundary() {
        let mut limiter = limiter(1, 100);
        limiter.try_acquire(t0()).unwrap();
        assert!(limiter
            .try_acquire(t0() + ChronoDuration::seconds(899))
            .is_err());
        // now == window_start + window_length resets the count
        limiter
            .try_acquire(t0() + ChronoDuration::seconds(900))
            .expect("window must reset at the boundary");
    }

    #[test]
    fn test_daily_window_blocks_independently() {
        let mut limiter = limiter(100, 2);
        limiter.try_acquire(t0()).unwrap();
        limiter.try_acquire(t0()).unwrap();
        let err = limiter.try_acquire(t0() + ChronoDuration::seconds(1));
        match err {
            Err(SyncError::RateLimitExceeded { retry_after_secs }) => {
                assert_eq!(retry_after_secs, 86_399);
            }
            other => panic!("expected RateLimitExceeded, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_both_counters_increment_per_attempt() {
        let mut limiter = limiter(10, 10);
        limiter.try_acquire(t0()).unwrap();
        limiter.try_acquire(t0()).unwrap();
        assert_eq!(limiter.counts(), (2, 2));
    }

    #[test]
    fn test_backoff_is_exponential() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }
}
