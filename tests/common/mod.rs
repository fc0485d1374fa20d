// SPDX-License-Identifier: MIT

//! Shared test fixtures: in-memory token storage and a loopback Strava stub.

use axum::Router;
use onsendo_sync::error::Result;
use onsendo_sync::models::OAuthToken;
use onsendo_sync::services::TokenStorage;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Mutex;

/// In-memory token storage so tests never touch the filesystem.
#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<OAuthToken>>,
}

impl MemoryTokenStorage {
    #[allow(dead_code)]
    pub fn with_token(token: OAuthToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<OAuthToken>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn save(&self, token: &OAuthToken) -> Result<()> {
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

/// A token that stays valid for the duration of a test.
#[allow(dead_code)]
pub fn fresh_token() -> OAuthToken {
    OAuthToken {
        access_token: "test_access".to_string(),
        refresh_token: "test_refresh".to_string(),
        expires_at: chrono::Utc::now().timestamp() + 3600,
        token_type: "Bearer".to_string(),
    }
}

/// Serve `router` on an ephemeral loopback port, returning its address.
#[allow(dead_code)]
pub async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    tokio::spawn(axum::serve(listener, router).into_future());
    addr
}
