// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Jall AI dashboard client
//!
//! Restores (or starts) a session against the Jall AI backend and reports
//! the wallet balance, locale, and tool status.

use jall_client::{
    config::Config,
    services::{ApiClient, FileStore, IpApiLocator, ProviderStatus},
    Dashboard,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(api = %config.api_base_url, "Starting Jall AI client");

    let store = Arc::new(FileStore::open(&config.storage_path)?);
    let backend = Arc::new(ApiClient::new(&config.api_base_url));
    let locator = Arc::new(IpApiLocator::new(&config.geolocation_url));
    let dashboard = Dashboard::new(config, backend, store, locator);

    let (restored, locale) = dashboard.init().await;
    tracing::info!(
        language = %locale.language,
        region = ?locale.region_code,
        local_currency = locale.is_local_currency_region,
        "Locale resolved"
    );

    let session = match restored {
        Some(session) => session,
        None => {
            let (Ok(email), Ok(password)) =
                (std::env::var("JALL_EMAIL"), std::env::var("JALL_PASSWORD"))
            else {
                tracing::warn!("No stored session; set JALL_EMAIL and JALL_PASSWORD to sign in");
                return Ok(());
            };
            dashboard.session.sign_in(&email, &password).await?
        }
    };
    tracing::info!(user = %session.display_name, "Session ready");

    let wallet = dashboard.wallet.refresh().await?;
    tracing::info!(
        balance = %wallet.balance,
        points = wallet.points(dashboard.config.recharge.points_per_usd),
        level = ?wallet.level(),
        "Wallet"
    );

    for (provider, status) in dashboard.activation.statuses().await? {
        match status {
            ProviderStatus::Active { remaining, .. } => {
                tracing::info!(provider = %provider.type_provider, %remaining, "Active")
            }
            ProviderStatus::Activate { price } => {
                tracing::info!(provider = %provider.type_provider, %price, "Available")
            }
            ProviderStatus::RechargeRequired { price, balance } => tracing::info!(
                provider = %provider.type_provider,
                %price,
                %balance,
                "Recharge required"
            ),
        }
    }

    dashboard.dispose();
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jall_client=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
