//! RTLS Server Binary
//!
//! Standalone server for the shop-floor tracking API.

use std::sync::Arc;

use rtls_core::config::RtlsConfig;
use rtls_server::{serve, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var("RTLS_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            tracing::info!("Loaded configuration from {}", path);
            RtlsConfig::from_toml(&raw)?
        }
        Err(_) => RtlsConfig::default(),
    };

    if let Ok(addr) = std::env::var("RTLS_ADDR") {
        config.server.addr = addr;
    }
    if let Ok(path) = std::env::var("RTLS_DB") {
        config.store.path = path;
    }
    config.validate()?;

    let state = Arc::new(AppState::from_config(&config)?);
    tracing::info!("Tracking store at {}", config.store.path);

    serve(&config.server.addr, state).await
}
