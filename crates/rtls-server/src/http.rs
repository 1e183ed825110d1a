//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use rtls_core::error::{ErrorKind, TrackError};
use rtls_core::floor::{CellId, ZoneId};
use rtls_core::persistence::Repository;
use rtls_core::projection::{WorkOrderDetail, ZonePositions};
use rtls_core::reconcile::SnapshotDelta;
use rtls_core::scanbuf::ScanRead;
use rtls_core::snapshot::Snapshot;
use rtls_core::workorder::WorkOrder;

use crate::AppState;

/// Map a tracking error onto a transport status code
fn error_reply(err: TrackError) -> (StatusCode, String) {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Run a store operation, retrying a bounded number of times while the
/// store reports a transient lock conflict
fn with_retry<T>(
    state: &AppState,
    mut op: impl FnMut(&mut Repository) -> Result<T, TrackError>,
) -> Result<T, TrackError> {
    let mut attempts = 0;
    loop {
        let result = {
            let mut repo = state.repository.lock().unwrap_or_else(|e| e.into_inner());
            op(&mut repo)
        };
        match result {
            Err(e) if e.is_busy() && attempts < state.max_retries => {
                attempts += 1;
                tracing::debug!(attempts, "store busy, retrying");
            }
            other => return other,
        }
    }
}

/// Raw tokens reported by a reader in one snapshot
#[derive(Debug, Deserialize)]
pub struct DetectionsRequest {
    pub tags: Vec<String>,
}

/// Ingest a full presence snapshot for a cell
pub async fn ingest_cell_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<DetectionsRequest>,
) -> Result<Json<SnapshotDelta>, (StatusCode, String)> {
    let snapshot = Snapshot::from_raw_tokens(&request.tags);
    let delta = with_retry(&state, |repo| repo.reconcile_cell(CellId(id), &snapshot))
        .map_err(error_reply)?;

    if !delta.is_noop() {
        tracing::info!(
            cell = id,
            entered = delta.entered.len(),
            reopened = delta.reopened.len(),
            departed = delta.departed.len(),
            "snapshot reconciled"
        );
    }
    Ok(Json(delta))
}

/// Ingest a full presence snapshot pushed by a physical reader
pub async fn ingest_reader_snapshot(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(request): Json<DetectionsRequest>,
) -> Result<Json<SnapshotDelta>, (StatusCode, String)> {
    let snapshot = Snapshot::from_raw_tokens(&request.tags);
    let delta = with_retry(&state, |repo| repo.reconcile_reader(&code, &snapshot))
        .map_err(error_reply)?;

    if !delta.is_noop() {
        tracing::info!(
            reader = %code,
            entered = delta.entered.len(),
            reopened = delta.reopened.len(),
            departed = delta.departed.len(),
            "snapshot reconciled"
        );
    }
    Ok(Json(delta))
}

/// Request to register a work order
#[derive(Debug, Deserialize)]
pub struct CreateWorkOrderRequest {
    pub job_id: String,
    pub tag_code: String,
}

/// Register a work order bound to a physical tag
pub async fn create_work_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWorkOrderRequest>,
) -> Result<Json<WorkOrder>, (StatusCode, String)> {
    let work_order = with_retry(&state, |repo| {
        repo.create_work_order(&request.job_id, &request.tag_code)
    })
    .map_err(error_reply)?;

    // A successful registration consumes the kiosk buffer
    state.scans.clear();

    tracing::info!(job_id = %work_order.job_id, "work order created");
    Ok(Json(work_order))
}

/// Get a work order with its derived state and movement history
pub async fn get_work_order(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<WorkOrderDetail>, (StatusCode, String)> {
    let detail =
        with_retry(&state, |repo| repo.get_work_order_detail(&job_id)).map_err(error_reply)?;

    detail.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Work order not found: {}", job_id),
        )
    })
}

/// Complete a work order
pub async fn finish_work_order(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<WorkOrder>, (StatusCode, String)> {
    let work_order =
        with_retry(&state, |repo| repo.finish_work_order(&job_id)).map_err(error_reply)?;

    tracing::info!(job_id = %work_order.job_id, "work order finished");
    Ok(Json(work_order))
}

/// The live view of a zone
pub async fn get_zone_positions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ZonePositions>, (StatusCode, String)> {
    let positions =
        with_retry(&state, |repo| repo.project_zone(ZoneId(id))).map_err(error_reply)?;
    Ok(Json(positions))
}

/// Raw kiosk scanner payload
///
/// Feeds may name their own delimiters; left out, the configured defaults
/// apply.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
    #[serde(default)]
    pub line_ending: Option<String>,
    #[serde(default)]
    pub field_delimiter: Option<String>,
}

/// Record a raw kiosk scan
pub async fn record_scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanRead>, (StatusCode, String)> {
    state
        .scans
        .record_delimited(
            &request.payload,
            request.line_ending.as_deref(),
            request.field_delimiter.as_deref(),
        )
        .map(Json)
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Scan payload carries no code".to_string(),
        ))
}

/// The most recent kiosk scan, if any
pub async fn latest_scan(State(state): State<Arc<AppState>>) -> Result<Json<ScanRead>, StatusCode> {
    state.scans.latest().map(Json).ok_or(StatusCode::NO_CONTENT)
}

/// System status and row counts
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let counts = with_retry(&state, |repo| repo.status_counts()).map_err(error_reply)?;

    Ok(Json(serde_json::json!({
        "zones": counts.zones,
        "cells": counts.cells,
        "work_orders": {
            "active": counts.active_work_orders
        },
        "occupancies": {
            "open": counts.open_occupancies
        },
        "scan_buffered": state.scans.latest().is_some(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtls_core::error::{PersistenceError, WorkOrderError};

    #[test]
    fn test_error_reply_mapping() {
        let (status, _) = error_reply(WorkOrderError::NotFound("J1".to_string()).into());
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_reply(WorkOrderError::TagInUse("E1".to_string()).into());
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = error_reply(TrackError::InvalidInput("empty".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_reply(PersistenceError::Database("oops".to_string()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_with_retry_passes_results_through() {
        let state = AppState::in_memory().unwrap();

        let zone = with_retry(&state, |repo| repo.create_zone("Hall A", 40.0, 25.0)).unwrap();
        let loaded = with_retry(&state, |repo| repo.get_zone(zone.id)).unwrap();
        assert!(loaded.is_some());

        let err = with_retry(&state, |repo| repo.finish_work_order("J404")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_with_retry_gives_up_after_bounded_attempts() {
        let state = AppState::in_memory().unwrap();

        let mut calls = 0u32;
        let err = with_retry(&state, |_| {
            calls += 1;
            Err::<(), _>(PersistenceError::Busy("locked".to_string()).into())
        })
        .unwrap_err();

        assert!(err.is_busy());
        assert_eq!(calls, state.max_retries + 1);
    }
}
