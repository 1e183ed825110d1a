//! Monitored cells
//!
//! A cell is fed by at most one physical reader, identified by the code
//! burned into the reader hardware.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ZoneId;

/// Database id of a cell row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub i64);

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hardware code of the reader feeding a cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReaderCode(pub String);

impl ReaderCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReaderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monitored micro-location inside a zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub zone_id: ZoneId,
    /// None until reader hardware is assigned to the cell
    pub reader_code: Option<ReaderCode>,
    /// Detection radius in map units
    pub radius: f64,
    /// Cell centre relative to the zone map
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Cell {
    pub fn is_retired(&self) -> bool {
        self.deleted_at.is_some()
    }
}
