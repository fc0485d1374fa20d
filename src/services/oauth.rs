// SPDX-License-Identifier: MIT

//! Interactive OAuth authorization-code flow.
//!
//! `start()` opens the Strava authorization page in the user's browser and
//! waits for the redirect on a loopback HTTP listener that accepts exactly
//! one callback. The callback result travels through a single-use oneshot
//! channel owned by the attempt, and the listener is shut down on every exit
//! path (success, provider error, timeout) so the port is never leaked.

use crate::error::{Result, SyncError};
use crate::models::OAuthToken;
use crate::services::token::{TokenManager, TOKEN_ENDPOINT};
use crate::services::{http_client, REQUEST_TIMEOUT_SECS};
use axum::{extract::Query, extract::State, response::Html, routing::get, Router};
use rand::Rng;
use serde::Deserialize;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Strava authorization endpoint, opened in the browser.
pub const AUTHORIZE_ENDPOINT: &str = "https://www.strava.com/oauth/authorize";

/// Scopes the journal needs: read everything, write links back.
pub const REQUIRED_SCOPES: &str = "activity:read_all,activity:write";

/// Where an authorization attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    AwaitingAuthorization,
    AwaitingCallback,
    Exchanging,
    Authenticated,
    Failed,
}

/// What the browser redirect delivered.
#[derive(Debug)]
enum CallbackOutcome {
    Code { code: String, state: String },
    ProviderError(String),
}

/// Query parameters Strava appends to the redirect URI.
#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Sender slot shared with the callback handler. Taken on first use so the
/// listener accepts exactly one meaningful request.
type ResultSlot = Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>;

/// Drives the authorization-code flow end to end.
pub struct OAuthAuthorizer {
    client_id: String,
    client_secret: String,
    redirect_port: u16,
    timeout: Duration,
    state: AuthState,
}

impl OAuthAuthorizer {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_port: u16,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_port,
            timeout: Duration::from_secs(timeout_secs),
            state: AuthState::Idle,
        }
    }

    /// Current position in the state machine.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Run the full flow: browser, callback, code exchange, persist.
    pub async fn start(&mut self, tokens: &TokenManager) -> Result<OAuthToken> {
        let redirect_uri = format!("http://localhost:{}/callback", self.redirect_port);
        let nonce: u64 = rand::rng().random();
        let state_nonce = format!("{:016x}", nonce);

        let url = build_authorize_url(
            AUTHORIZE_ENDPOINT,
            &self.client_id,
            &redirect_uri,
            REQUIRED_SCOPES,
            &state_nonce,
        );

        // Bind the listener before opening the browser so the redirect
        // cannot race an unbound port.
        let listener = CallbackListener::bind(self.redirect_port).await?;

        self.state = AuthState::AwaitingAuthorization;
        tracing::info!(port = self.redirect_port, "Opening browser for Strava authorization");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "Could not open browser, visit the URL manually");
            tracing::info!(url = %url, "Authorization URL");
        }

        self.state = AuthState::AwaitingCallback;
        let outcome = listener.wait(self.timeout).await;

        let (code, returned_state) = match outcome {
            Ok(CallbackOutcome::Code { code, state }) => (code, state),
            Ok(CallbackOutcome::ProviderError(error)) => {
                self.state = AuthState::Failed;
                return Err(SyncError::Authentication(format!(
                    "Authorization denied by provider: {}",
                    error
                )));
            }
            Err(e) => {
                self.state = AuthState::Failed;
                return Err(e);
            }
        };

        if returned_state != state_nonce {
            self.state = AuthState::Failed;
            return Err(SyncError::Authentication(
                "OAuth state mismatch in callback".to_string(),
            ));
        }

        self.state = AuthState::Exchanging;
        tracing::info!("Exchanging authorization code for tokens");
        let token = match self.exchange_code(&code).await {
            Ok(t) => t,
            Err(e) => {
                self.state = AuthState::Failed;
                return Err(e);
            }
        };

        tokens.save(&token)?;
        self.state = AuthState::Authenticated;
        tracing::info!(expires_at = token.expires_at, "Authorization complete, token stored");
        Ok(token)
    }

    /// Exchange the authorization code at the token endpoint.
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        #[derive(Deserialize)]
        struct ExchangeResponse {
            access_token: String,
            refresh_token: String,
            expires_at: i64,
            #[serde(default)]
            token_type: Option<String>,
        }

        let response = http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "Token exchange failed (HTTP {}): {}",
                status, body
            )));
        }

        let exchanged: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("Malformed token response: {}", e)))?;

        Ok(OAuthToken {
            access_token: exchanged.access_token,
            refresh_token: exchanged.refresh_token,
            expires_at: exchanged.expires_at,
            token_type: exchanged.token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }
}

/// Build the browser authorization URL.
fn build_authorize_url(
    base: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        base,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
        urlencoding::encode(state),
    )
}

/// One-shot loopback listener for the OAuth redirect.
pub(crate) struct CallbackListener {
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
}

impl CallbackListener {
    /// Bind the redirect port. Port 0 picks an ephemeral port (tests).
    pub(crate) async fn bind(port: u16) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| SyncError::Network(format!("Could not bind callback port {}: {}", port, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SyncError::Network(format!("Callback listener address: {}", e)))?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until one callback arrives or `timeout` elapses, then shut the
    /// server down and release the port before returning either way.
    async fn wait(self, timeout: Duration) -> Result<CallbackOutcome> {
        let (result_tx, result_rx) = oneshot::channel();
        let slot: ResultSlot = Arc::new(Mutex::new(Some(result_tx)));

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(slot);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .into_future(),
        );

        let outcome = tokio::time::timeout(timeout, result_rx).await;

        // Tear the server down no matter how the wait ended; the port is
        // only free again once the serve task finishes.
        shutdown_tx.send(()).ok();
        if let Err(e) = server.await {
            tracing::warn!(error = %e, "Callback server task ended abnormally");
        }

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(SyncError::Network(
                "Callback channel closed before a result arrived".to_string(),
            )),
            Err(_) => Err(SyncError::Authentication(format!(
                "Timed out after {}s waiting for the OAuth callback",
                timeout.as_secs()
            ))),
        }
    }
}

/// Axum handler for the redirect. Only the first request carries a result;
/// later hits get a static page.
async fn handle_callback(
    State(slot): State<ResultSlot>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    let Some(sender) = sender else {
        return Html("<html><body><p>Already handled. You can close this tab.</p></body></html>");
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        sender.send(CallbackOutcome::ProviderError(error)).ok();
        return Html(
            "<html><body><h3>Authorization failed</h3>\
             <p>Strava reported an error. You can close this tab.</p></body></html>",
        );
    }

    match params.code {
        Some(code) => {
            sender
                .send(CallbackOutcome::Code {
                    code,
                    state: params.state.unwrap_or_default(),
                })
                .ok();
            Html(
                "<html><body><h3>Authorization complete</h3>\
                 <p>onsendo is connected to Strava. You can close this tab.</p></body></html>",
            )
        }
        None => {
            sender
                .send(CallbackOutcome::ProviderError(
                    "callback carried neither code nor error".to_string(),
                ))
                .ok();
            Html("<html><body><p>Malformed callback. You can close this tab.</p></body></html>")
        }
    }
}
