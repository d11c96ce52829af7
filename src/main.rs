// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vireal auth API server.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vireal_auth::{
    config::Config,
    db::{FirestoreDb, MemoryStore, UserStore},
    services::{IdentityVerifiers, TokenService, UserDirectory},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        "Starting Vireal auth API"
    );

    let store: Arc<dyn UserStore> = match &config.gcp_project_id {
        Some(project_id) => Arc::new(FirestoreDb::new(project_id).await?),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set; users are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let identity = IdentityVerifiers::new(&config)?;
    let tokens = TokenService::new(&config);
    tracing::info!(
        access_ttl_secs = tokens.access_ttl_secs(),
        "Token service initialized"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        users: UserDirectory::new(store),
        tokens,
        identity,
    });

    let app = vireal_auth::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), tracing_subscriber::filter::ParseError> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vireal_auth=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
