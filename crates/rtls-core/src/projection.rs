//! Read models assembled from the tracking tables
//!
//! These are query results, not stored rows. The repository builds them in
//! the same transaction as the lookups they summarize.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::floor::{CellId, ZoneId};
use crate::workorder::{WorkOrderId, WorkOrderState};

/// One work order currently present in a cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePosition {
    pub work_order_id: WorkOrderId,
    pub job_id: String,
    pub epc_code: String,
    pub created_at: DateTime<Utc>,
    pub entered_at: DateTime<Utc>,
}

/// A cell and everything open inside it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellPositions {
    pub cell_id: CellId,
    pub cell_name: String,
    pub radius: f64,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub positions: Vec<ActivePosition>,
}

/// The live view of a zone: every cell with its open occupancies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonePositions {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub length: f64,
    pub width: f64,
    pub generated_at: DateTime<Utc>,
    pub cells: Vec<CellPositions>,
}

/// One completed or ongoing stay in a cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyVisit {
    pub cell_id: CellId,
    pub cell_name: String,
    pub entered_at: DateTime<Utc>,
    pub moved_at: Option<DateTime<Utc>>,
}

/// A work order with its derived state and full movement history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderDetail {
    pub work_order_id: WorkOrderId,
    pub job_id: String,
    pub state: WorkOrderState,
    pub epc_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub visits: Vec<OccupancyVisit>,
}

/// Row counts reported by the status endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub zones: u64,
    pub cells: u64,
    pub active_work_orders: u64,
    pub open_occupancies: u64,
}
