// SPDX-License-Identifier: MIT

//! onsendo-sync: Strava synchronization core for a personal onsen journal.
//!
//! This crate handles the provider side of the journal: OAuth token
//! lifecycle, a dual-window rate-limited API transport, the activity
//! catalog client, and the engine that pairs imported heart-rate
//! recordings with recorded onsen visits.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ActivityCatalogClient, FileTokenStorage, RateLimitedTransport, TokenManager};

/// Wires the configured sync stack one way, for the binary and for tests.
pub struct SyncContext {
    pub config: Config,
    pub catalog: ActivityCatalogClient,
}

impl SyncContext {
    /// Build the full stack: file token storage → manager → transport →
    /// catalog client.
    pub fn new(config: Config) -> error::Result<Self> {
        let storage = FileTokenStorage::new(config.token_path.clone());
        let tokens = TokenManager::new(
            Box::new(storage),
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
        )?;
        let transport = RateLimitedTransport::new(tokens, config.rate_limits)?;
        let catalog = ActivityCatalogClient::new(transport);
        Ok(Self { config, catalog })
    }
}
