// SPDX-License-Identifier: MIT

//! onsendo-sync command entry point.
//!
//! `auth` runs the interactive Strava authorization flow and stores the
//! token; `activities` lists recent activities through the rate-limited
//! client. Pairing runs inside the journal, which owns the visit store.

use chrono::{Duration, Utc};
use onsendo_sync::{
    config::Config,
    models::ActivityFilter,
    services::{FileTokenStorage, OAuthAuthorizer, TokenManager},
    SyncContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    let command = std::env::args().nth(1).unwrap_or_default();

    match command.as_str() {
        "auth" => auth(config).await?,
        "activities" => activities(config).await?,
        _ => {
            eprintln!("usage: onsendo-sync <auth|activities>");
            std::process::exit(2);
        }
    }
    Ok(())
}

/// Run the interactive authorization flow and persist the token.
async fn auth(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let tokens = TokenManager::new(
        Box::new(FileTokenStorage::new(config.token_path.clone())),
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    )?;

    let mut authorizer = OAuthAuthorizer::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        config.oauth_redirect_port,
        config.oauth_timeout_secs,
    );

    let token = authorizer.start(&tokens).await?;
    tracing::info!(
        expires_at = token.expires_at,
        path = %config.token_path.display(),
        "Authorized with Strava"
    );
    Ok(())
}

/// List the last 30 days of activities.
async fn activities(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = SyncContext::new(config)?;

    let filter = ActivityFilter {
        after: Some(Utc::now() - Duration::days(30)),
        ..ActivityFilter::default()
    };
    let activities = match ctx.catalog.list_all_activities(&filter).await {
        Ok(activities) => activities,
        Err(e) if e.is_auth_error() => {
            eprintln!("Strava credentials are no longer usable; run `onsendo-sync auth` first.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    for activity in &activities {
        println!(
            "{:>12}  {}  {}",
            activity.id,
            onsendo_sync::time_utils::format_utc_rfc3339(activity.start_date),
            activity.name
        );
    }
    let (short, daily) = ctx.catalog.transport().rate_counts().await;
    tracing::info!(
        count = activities.len(),
        rate_15min = short,
        rate_daily = daily,
        "Listed activities"
    );
    Ok(())
}

/// Initialize logging to stderr with env-filter control.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("onsendo_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
