use anyhow::{Context, Result};
use fleetcast::api::{create_query_router, create_ws_router, QueryAppState, WsAppState};
use fleetcast::config::{load_config, FleetConfig};
use fleetcast::fetch::HttpBulkFetcher;
use fleetcast::hub::{HubConfig, LocationHub};
use fleetcast::nats::NatsConnector;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetcast=info".into()),
        )
        .init();

    info!("fleetcast starting...");

    let mut config = match std::env::var("FLEETCAST_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => {
            info!("FLEETCAST_CONFIG not set, using defaults");
            FleetConfig::default()
        }
    };
    config.apply_env();

    info!(
        nats_url = %config.nats.url,
        subject = %config.nats.subject,
        fetch_url = %config.fetch.base_url,
        bind = %config.api.bind,
        "Configuration loaded"
    );

    let fetcher = Arc::new(HttpBulkFetcher::new(config.fetch.clone())?);
    let connector = Arc::new(NatsConnector::new(config.nats.clone()));

    let hub = LocationHub::new(
        HubConfig {
            throttle: config.throttle.clone(),
            supervisor: config.supervisor.clone(),
        },
        fetcher,
        connector,
    );

    let app = create_query_router(Arc::new(QueryAppState { hub: hub.clone() }))
        .merge(create_ws_router(Arc::new(WsAppState { hub })))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.api.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind))?;

    info!(bind = %config.api.bind, "Serving location API");
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
