// SPDX-License-Identifier: MIT

//! Token persistence and refresh lifecycle.

mod common;

use axum::routing::post;
use axum::{Json, Router};
use common::{fresh_token, spawn_stub, MemoryTokenStorage};
use onsendo_sync::error::SyncError;
use onsendo_sync::models::OAuthToken;
use onsendo_sync::services::{FileTokenStorage, TokenManager, TokenStorage};
use std::path::PathBuf;

fn temp_token_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join("onsendo-sync-tests")
        .join(format!("{}-{}.json", name, std::process::id()))
}

#[test]
fn test_file_storage_roundtrip() {
    let path = temp_token_path("roundtrip");
    let storage = FileTokenStorage::new(path.clone());

    assert!(storage.load().unwrap().is_none(), "no token yet");

    let token = fresh_token();
    storage.save(&token).unwrap();
    assert_eq!(storage.load().unwrap().unwrap(), token);

    storage.delete().unwrap();
    assert!(storage.load().unwrap().is_none());
    assert!(!path.exists());
}

#[test]
fn test_file_storage_overwrites_previous_token() {
    let storage = FileTokenStorage::new(temp_token_path("overwrite"));

    let mut token = fresh_token();
    storage.save(&token).unwrap();

    token.access_token = "second".to_string();
    token.expires_at += 100;
    storage.save(&token).unwrap();

    let loaded = storage.load().unwrap().unwrap();
    assert_eq!(loaded.access_token, "second");
    storage.delete().unwrap();
}

#[cfg(unix)]
#[test]
fn test_file_storage_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let path = temp_token_path("perms");
    let storage = FileTokenStorage::new(path.clone());
    storage.save(&fresh_token()).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600, "token file must be owner-only");
    storage.delete().unwrap();
}

#[test]
fn test_file_storage_leaves_no_temp_file_behind() {
    let path = temp_token_path("atomic");
    let storage = FileTokenStorage::new(path.clone());
    storage.save(&fresh_token()).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
    storage.delete().unwrap();
}

#[test]
fn test_corrupt_token_file_is_a_file_error() {
    let path = temp_token_path("corrupt");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    let storage = FileTokenStorage::new(path.clone());
    assert!(matches!(storage.load(), Err(SyncError::File(_))));
    std::fs::remove_file(path).ok();
}

#[tokio::test]
async fn test_refresh_persists_and_extends_expiry() {
    let old = fresh_token();
    let old_expiry = old.expires_at;

    async fn token_endpoint() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "access_token": "new_access",
            "refresh_token": "new_refresh",
            "expires_at": chrono::Utc::now().timestamp() + 99_999,
            "token_type": "Bearer"
        }))
    }
    let addr = spawn_stub(Router::new().route("/token", post(token_endpoint))).await;

    let manager = TokenManager::new(
        Box::new(MemoryTokenStorage::with_token(old.clone())),
        "id".to_string(),
        "secret".to_string(),
    )
    .unwrap()
    .with_token_url(format!("http://{}/token", addr));

    let refreshed = manager.refresh(&old).await.unwrap();
    assert!(refreshed.expires_at > old_expiry, "expiry must increase");
    assert_eq!(refreshed.access_token, "new_access");

    // The new token was persisted immediately
    let stored = manager.load().unwrap().unwrap();
    assert_eq!(stored, refreshed);
}

#[tokio::test]
async fn test_rejected_refresh_token_is_authentication_error() {
    async fn token_endpoint() -> (axum::http::StatusCode, Json<serde_json::Value>) {
        (
            axum::http::StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid_grant"})),
        )
    }
    let addr = spawn_stub(Router::new().route("/token", post(token_endpoint))).await;

    let old = fresh_token();
    let manager = TokenManager::new(
        Box::new(MemoryTokenStorage::with_token(old.clone())),
        "id".to_string(),
        "secret".to_string(),
    )
    .unwrap()
    .with_token_url(format!("http://{}/token", addr));

    let err = manager.refresh(&old).await;
    assert!(matches!(err, Err(SyncError::Authentication(_))));
}

#[tokio::test]
async fn test_non_increasing_expiry_is_rejected() {
    async fn token_endpoint() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "access_token": "stale",
            "refresh_token": "stale",
            "expires_at": 0,
            "token_type": "Bearer"
        }))
    }
    let addr = spawn_stub(Router::new().route("/token", post(token_endpoint))).await;

    let old = fresh_token();
    let manager = TokenManager::new(
        Box::new(MemoryTokenStorage::with_token(old.clone())),
        "id".to_string(),
        "secret".to_string(),
    )
    .unwrap()
    .with_token_url(format!("http://{}/token", addr));

    let err = manager.refresh(&old).await;
    assert!(matches!(err, Err(SyncError::Authentication(_))));

    // The stale token must not have replaced the stored one
    let stored: OAuthToken = manager.load().unwrap().unwrap();
    assert_eq!(stored, old);
}

#[tokio::test]
async fn test_refresh_against_unreachable_endpoint_is_network_error() {
    let old = fresh_token();
    let manager = TokenManager::new(
        Box::new(MemoryTokenStorage::with_token(old.clone())),
        "id".to_string(),
        "secret".to_string(),
    )
    .unwrap()
    .with_token_url("http://127.0.0.1:1/token".to_string());

    let err = manager.refresh(&old).await;
    assert!(matches!(err, Err(SyncError::Network(_))));
}

#[tokio::test]
async fn test_refresh_against_silent_endpoint_times_out() {
    // Endpoint accepts the connection but never answers; the client-side
    // request timeout must bound the refresh instead of hanging it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            open.push(stream);
        }
    });

    let old = fresh_token();
    let manager = TokenManager::new(
        Box::new(MemoryTokenStorage::with_token(old.clone())),
        "id".to_string(),
        "secret".to_string(),
    )
    .unwrap()
    .with_token_url(format!("http://{}/token", addr))
    .with_request_timeout(std::time::Duration::from_secs(1))
    .unwrap();

    let err = tokio::time::timeout(std::time::Duration::from_secs(5), manager.refresh(&old))
        .await
        .expect("refresh must fail within its request timeout, not hang");
    assert!(matches!(err, Err(SyncError::Network(_))));
}
