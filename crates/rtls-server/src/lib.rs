//! RTLS Server - shop-floor tracking API
//!
//! HTTP server exposing snapshot ingestion, the work-order lifecycle, zone
//! projections, and the kiosk scan feed.

pub mod http;

use std::sync::{Arc, Mutex};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rtls_core::config::RtlsConfig;
use rtls_core::error::TrackError;
use rtls_core::persistence::Repository;
use rtls_core::scanbuf::ScanBuffer;

/// Shared application state
pub struct AppState {
    pub repository: Mutex<Repository>,
    pub scans: ScanBuffer,
    pub max_retries: u32,
}

impl AppState {
    /// Open the configured store and wire up the shared state
    pub fn from_config(config: &RtlsConfig) -> Result<Self, TrackError> {
        let repository = Repository::new(&config.store.path)?;
        repository.set_busy_timeout(config.store.busy_timeout_ms)?;

        Ok(Self {
            repository: Mutex::new(repository),
            scans: ScanBuffer::with_delimiters(
                config.scan.field_delimiter.clone(),
                config.scan.line_separator.clone(),
            ),
            max_retries: config.server.max_retries,
        })
    }

    /// State over an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, TrackError> {
        Ok(Self {
            repository: Mutex::new(Repository::in_memory()?),
            scans: ScanBuffer::new(),
            max_retries: 3,
        })
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Snapshot ingestion
        .route("/cells/{id}/detections", post(http::ingest_cell_snapshot))
        .route(
            "/readers/{code}/detections",
            post(http::ingest_reader_snapshot),
        )
        // Work-order lifecycle
        .route("/work-orders", post(http::create_work_order))
        .route("/work-orders/{job_id}", get(http::get_work_order))
        .route("/work-orders/{job_id}/finish", post(http::finish_work_order))
        // Projection
        .route("/zones/{id}/positions", get(http::get_zone_positions))
        // Kiosk scan feed
        .route("/scans", post(http::record_scan))
        .route("/scans/latest", get(http::latest_scan))
        // System
        .route("/status", get(http::get_status))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("RTLS server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
