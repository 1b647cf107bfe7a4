// SPDX-License-Identifier: MIT

//! QuakeWatch Gateway API Server
//!
//! Authenticates dashboard users, relays authorized data requests to the
//! platform backend, and keeps the live readings/earthquakes cache fed.

use quakewatch_gateway::{
    config::Config,
    services::{BackendClient, GoogleIdentityVerifier, IdentityService},
    sync::{EventCache, LiveSync},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting QuakeWatch Gateway");

    let backend = BackendClient::new(&config);

    let verifier =
        Arc::new(GoogleIdentityVerifier::new(&config).expect("Failed to initialize identity verifier"));
    let identity = IdentityService::new(&config, backend.clone(), verifier);

    // Shared live cache plus the sync tasks that feed it
    let cache = Arc::new(EventCache::new());
    let live = LiveSync::start(&config, cache.clone());
    tracing::info!(mode = ?live.mode(), "Live sync started");

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        backend,
        identity,
        cache,
        live,
    });

    // Build router
    let app = quakewatch_gateway::routes::create_router(state);

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
                .add_directive("quakewatch_gateway=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
