//! Work-order lifecycle state
//!
//! State transitions:
//! ```text
//! Created → Tracked ⇄ Exited → Finished
//! ```
//!
//! The state is not stored as a column; it is derived from the completion
//! timestamp and the shape of the latest occupancy.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOrderState {
    /// Work order and binding exist, never detected in any cell
    Created,
    /// Currently inside a cell (latest occupancy open)
    Tracked,
    /// Left every cell (latest occupancy closed)
    Exited,
    /// Completed, terminal
    Finished,
}

impl WorkOrderState {
    /// Derive the state from row shape.
    ///
    /// `latest_occupancy_open` is `None` when the work order has no
    /// occupancy history at all, otherwise whether the latest interval is
    /// still open.
    pub fn derive(finished: bool, latest_occupancy_open: Option<bool>) -> Self {
        if finished {
            WorkOrderState::Finished
        } else {
            match latest_occupancy_open {
                None => WorkOrderState::Created,
                Some(true) => WorkOrderState::Tracked,
                Some(false) => WorkOrderState::Exited,
            }
        }
    }

    /// Check if a state transition is valid
    pub fn can_transition_to(&self, target: &WorkOrderState) -> bool {
        match (self, target) {
            // First detection in a cell
            (WorkOrderState::Created, WorkOrderState::Tracked) => true,

            // Leaving the last cell
            (WorkOrderState::Tracked, WorkOrderState::Exited) => true,

            // Re-detected after leaving, or completed
            (WorkOrderState::Exited, WorkOrderState::Tracked) => true,
            (WorkOrderState::Exited, WorkOrderState::Finished) => true,

            // Finished is terminal
            (WorkOrderState::Finished, _) => false,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Get valid next states from the current state
    pub fn valid_transitions(&self) -> Vec<WorkOrderState> {
        match self {
            WorkOrderState::Created => vec![WorkOrderState::Tracked],
            WorkOrderState::Tracked => vec![WorkOrderState::Exited],
            WorkOrderState::Exited => {
                vec![WorkOrderState::Tracked, WorkOrderState::Finished]
            }
            WorkOrderState::Finished => vec![],
        }
    }

    /// Check if the work order has reached its terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderState::Finished)
    }

    /// Check if finish may be applied in this state
    pub fn is_finishable(&self) -> bool {
        matches!(self, WorkOrderState::Exited)
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            WorkOrderState::Created => "Created, not yet detected in any cell",
            WorkOrderState::Tracked => "Currently inside a cell",
            WorkOrderState::Exited => "Left every cell, awaiting finish or tag reuse",
            WorkOrderState::Finished => "Completed",
        }
    }
}

impl Default for WorkOrderState {
    fn default() -> Self {
        WorkOrderState::Created
    }
}

impl std::fmt::Display for WorkOrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkOrderState::Created => write!(f, "CREATED"),
            WorkOrderState::Tracked => write!(f, "TRACKED"),
            WorkOrderState::Exited => write!(f, "EXITED"),
            WorkOrderState::Finished => write!(f, "FINISHED"),
        }
    }
}
