// SPDX-License-Identifier: MIT

//! Disc Golf ETL Server
//!
//! Exposes the scorecard fetch and warehouse load steps as task endpoints
//! for the scheduler, plus read-only status routes.

use disc_golf_etl::{
    config::Config,
    db::Warehouse,
    services::{Dispatcher, Pipeline, RawStore, ScorecardFetcher, SecretStore, UdiscClient, UserRegistry},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, mode = ?config.load_mode, "Starting Disc Golf ETL");

    // Users: metadata from env, passwords from the credential secret
    let secrets = SecretStore::from_json(&config.credentials_json);
    let users = UserRegistry::from_config(&config.users_json, &secrets)
        .expect("Failed to load users");
    if users.is_empty() {
        tracing::warn!("No users with credentials configured, runs will fetch nothing");
    }
    for (name, summary) in users.summary() {
        tracing::info!(
            user = %name,
            configured = summary.configured,
            role = %summary.role,
            "User configuration"
        );
    }

    // Warehouse
    let warehouse = Warehouse::connect(&config.warehouse_path)
        .await
        .expect("Failed to open warehouse");

    // UDisc client and per-user dispatcher
    let client = UdiscClient::new(
        &config.udisc_base_url,
        &config.parse_app_id,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let dispatcher = Dispatcher::new(
        ScorecardFetcher::new(client.clone()),
        Duration::from_secs(config.user_deadline_secs),
    );

    let store = RawStore::new(config.data_dir.clone());
    tracing::info!(path = %store.root().display(), "Raw store initialized");

    let pipeline = Pipeline::new(users, dispatcher, store, warehouse, config.load_mode);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        pipeline,
        udisc: client,
    });

    // Build router
    let app = disc_golf_etl::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("disc_golf_etl=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
