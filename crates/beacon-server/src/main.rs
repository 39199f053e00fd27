use std::sync::Arc;

use anyhow::Result;
use beacon_core::{events, AppConfig, AppState};
use beacon_gateway::registry::SessionRegistry;
use beacon_gateway::GatewayState;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beacon=info")),
        )
        .init();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    ensure_data_dir(&config.database.url);
    let db = beacon_db::create_pool(&config.database.url, config.database.max_connections).await?;
    beacon_db::run_migrations(&db).await?;

    let (bus, events_rx) = events::channel(config.gateway.event_capacity);
    let state = AppState {
        db,
        events: bus,
        config: AppConfig {
            cluster: config.server.cluster.clone(),
            mode: config.server.mode.clone(),
        },
    };

    let registry = Arc::new(SessionRegistry::new());
    let _fanout = beacon_gateway::spawn_fanout(registry.clone(), events_rx);

    let app = routes::app(GatewayState {
        app: state,
        registry,
    });
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %config.server.bind_address, "beacon gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// SQLite URLs with a relative path need their parent directory to exist.
fn ensure_data_dir(database_url: &str) {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
    else {
        return;
    };
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %err, "could not create data directory");
            }
        }
    }
}
