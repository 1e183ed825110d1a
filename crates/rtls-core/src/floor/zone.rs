//! Shop floors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database id of a zone row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub i64);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named shop-floor area containing cells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    /// Physical floor dimensions, for map display
    pub length: f64,
    pub width: f64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Zone {
    pub fn is_retired(&self) -> bool {
        self.deleted_at.is_some()
    }
}
