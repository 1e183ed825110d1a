//! Work orders and their tag bindings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::TagId;

/// Database id of a work-order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkOrderId(pub i64);

impl std::fmt::Display for WorkOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database id of a work-order/tag binding row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkOrderTagId(pub i64);

impl std::fmt::Display for WorkOrderTagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked unit of work
///
/// `ended_at` stays null while the work order is active. It is set exactly
/// once, by an explicit finish or by the implicit auto-close when the tag is
/// reused for a new work order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    /// External job identifier, unique across all work orders
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkOrder {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// The binding between one work order and one tag
///
/// Created together with its work order and never mutated; reusing a tag
/// creates a new work order with a new binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderTag {
    pub id: WorkOrderTagId,
    pub work_order_id: WorkOrderId,
    pub tag_id: TagId,
    pub created_at: DateTime<Utc>,
}
