// SPDX-License-Identifier: MIT

//! OAuth token lifecycle: persistence and refresh.
//!
//! Storage is behind a trait so tests can run against an in-memory store
//! instead of touching the filesystem. The shipping implementation writes a
//! JSON file readable only by the owning user.

use crate::error::{Result, SyncError};
use crate::models::token::{OAuthToken, DEFAULT_EXPIRY_SKEW_SECS};
use crate::services::{http_client, REQUEST_TIMEOUT_SECS};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Strava token endpoint (authorization-code and refresh grants).
pub const TOKEN_ENDPOINT: &str = "https://www.strava.com/oauth/token";

/// Persistence for the OAuth token.
pub trait TokenStorage: Send + Sync {
    /// Load the stored token. `None` means "not authenticated yet".
    fn load(&self) -> Result<Option<OAuthToken>>;

    /// Persist the token, replacing any previous one.
    fn save(&self, token: &OAuthToken) -> Result<()>;

    /// Remove the stored token, if any.
    fn delete(&self) -> Result<()>;
}

/// File-backed token storage: JSON, owner read/write only, atomic replace.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<OAuthToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| SyncError::File(format!("Failed to read token file: {}", e)))?;
        let token = serde_json::from_str(&json)
            .map_err(|e| SyncError::File(format!("Corrupt token file: {}", e)))?;
        Ok(Some(token))
    }

    fn save(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SyncError::File(format!("Failed to create token dir: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(token)
            .map_err(|e| SyncError::File(format!("Failed to serialize token: {}", e)))?;

        // Write to a sibling temp file, then rename into place so a crash
        // mid-write never leaves a truncated token behind.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| SyncError::File(format!("Failed to write token file: {}", e)))?;

        // 0600: the refresh token is a long-lived credential
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&tmp_path)
                .map_err(|e| SyncError::File(format!("Failed to stat token file: {}", e)))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp_path, perms)
                .map_err(|e| SyncError::File(format!("Failed to set permissions: {}", e)))?;
        }

        fs::rename(&tmp_path, &self.path)
            .map_err(|e| SyncError::File(format!("Failed to replace token file: {}", e)))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| SyncError::File(format!("Failed to delete token file: {}", e)))?;
        }
        Ok(())
    }
}

/// Token endpoint response for the refresh grant.
#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    #[serde(default)]
    token_type: Option<String>,
}

/// Manages the single stored OAuth token: load, save, expiry, refresh.
pub struct TokenManager {
    storage: Box<dyn TokenStorage>,
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenManager {
    pub fn new(
        storage: Box<dyn TokenStorage>,
        client_id: String,
        client_secret: String,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            http: http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?,
            token_url: TOKEN_ENDPOINT.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Point the manager at a different token endpoint (tests).
    pub fn with_token_url(mut self, token_url: String) -> Self {
        self.token_url = token_url;
        self
    }

    /// Override the per-request timeout (tests).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = http_client(timeout)?;
        Ok(self)
    }

    /// Load the persisted token. Absence is not an error.
    pub fn load(&self) -> Result<Option<OAuthToken>> {
        self.storage.load()
    }

    /// Persist a token (after authorization or refresh).
    pub fn save(&self, token: &OAuthToken) -> Result<()> {
        self.storage.save(token)
    }

    /// Drop the stored token, forcing re-authentication next time.
    pub fn delete(&self) -> Result<()> {
        self.storage.delete()
    }

    /// Whether the token should be refreshed before use.
    pub fn is_expired(&self, token: &OAuthToken) -> bool {
        token.is_expired_at(crate::time_utils::epoch_now(), DEFAULT_EXPIRY_SKEW_SECS)
    }

    /// Exchange the refresh token for a new token pair and persist it.
    ///
    /// An invalid or revoked refresh token surfaces as an authentication
    /// error; anything transport-level surfaces as a network error.
    pub async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
        tracing::info!("Access token expired, refreshing");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("Token refresh request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "Refresh token rejected (HTTP {}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Network(format!(
                "Token refresh failed (HTTP {}): {}",
                status, body
            )));
        }

        let refreshed: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("Malformed token response: {}", e)))?;

        // A refresh must push the expiry forward, never backward.
        if refreshed.expires_at <= token.expires_at {
            return Err(SyncError::Authentication(format!(
                "Refresh returned non-increasing expiry ({} -> {})",
                token.expires_at, refreshed.expires_at
            )));
        }

        let new_token = OAuthToken {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expires_at: refreshed.expires_at,
            token_type: refreshed.token_type.unwrap_or_else(|| "Bearer".to_string()),
        };

        self.storage.save(&new_token)?;
        tracing::info!(expires_at = new_token.expires_at, "Token refreshed and stored");
        Ok(new_token)
    }
}
