//! Occupancy intervals
//!
//! One row per (binding, presence interval). `moved_at` is null while the
//! binding is inside the cell and set to the exit instant once it leaves.
//! The most recent row for a binding is its last known position; at most
//! one row per binding is open at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::floor::CellId;
use crate::workorder::WorkOrderTagId;

/// Database id of an occupancy row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OccupancyId(pub i64);

impl std::fmt::Display for OccupancyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A timestamped presence interval of a binding in a cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occupancy {
    pub id: OccupancyId,
    pub cell_id: CellId,
    pub work_order_tag_id: WorkOrderTagId,
    pub entered_at: DateTime<Utc>,
    pub moved_at: Option<DateTime<Utc>>,
}

impl Occupancy {
    /// True while the binding is still inside the cell
    pub fn is_open(&self) -> bool {
        self.moved_at.is_none()
    }
}
