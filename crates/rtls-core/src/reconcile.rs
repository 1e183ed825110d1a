//! Snapshot reconciliation
//!
//! Diffs a reported tag set against the cell's open occupancies and derives
//! enter, exit, re-enter, and move events. The lookup result for a newly
//! appeared code is an explicit tagged value, and each variant maps to
//! exactly one mutation, so the whole decision table is visible in one
//! `match` instead of being spread across nullable-join checks.

use serde::Serialize;

use crate::floor::CellId;
use crate::occupancy::OccupancyId;
use crate::tag::{EpcCode, TagId};
use crate::workorder::{WorkOrderId, WorkOrderTagId};

/// An active work-order/tag binding resolved for a tag code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBinding {
    pub work_order_tag_id: WorkOrderTagId,
    pub work_order_id: WorkOrderId,
    pub tag_id: TagId,
}

/// A binding's most recent occupancy, as seen by the lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastOccupancy {
    pub id: OccupancyId,
    pub cell_id: CellId,
}

/// Where a tag code currently stands
///
/// Resolved in one lookup: the active binding for the code (work order not
/// ended), and that binding's latest occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPosition {
    /// No active work order references this code
    NoActiveBinding,
    /// Active binding with no occupancy history at all
    BoundNoOccupancy(ActiveBinding),
    /// Active binding currently open inside a cell
    BoundOpenInCell(ActiveBinding, LastOccupancy),
    /// Active binding whose latest occupancy is closed
    BoundClosedInCell(ActiveBinding, LastOccupancy),
}

impl BindingPosition {
    /// The binding, when one exists
    pub fn binding(&self) -> Option<ActiveBinding> {
        match self {
            BindingPosition::NoActiveBinding => None,
            BindingPosition::BoundNoOccupancy(binding)
            | BindingPosition::BoundOpenInCell(binding, _)
            | BindingPosition::BoundClosedInCell(binding, _) => Some(*binding),
        }
    }
}

/// The single mutation a newly appeared code maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppearAction {
    /// Unknown or untracked code: reader noise, nothing happens
    Ignore,
    /// First detection, or entry after leaving a different cell: new open interval
    Enter(WorkOrderTagId),
    /// Detected here while still open in another cell: close the stale
    /// interval there and open a new one here, in the same transaction
    Transfer {
        work_order_tag_id: WorkOrderTagId,
        stale: OccupancyId,
    },
    /// Flickered out and back in the same cell: clear `moved_at`, keep the
    /// original `entered_at`
    Reopen(OccupancyId),
    /// Already tracked in this cell, nothing to do
    Hold,
}

/// Map a resolved position to the one action the reconciler performs for a
/// code that appeared in the snapshot of `at`
pub fn appear_action(position: &BindingPosition, at: CellId) -> AppearAction {
    match position {
        BindingPosition::NoActiveBinding => AppearAction::Ignore,
        BindingPosition::BoundNoOccupancy(binding) => {
            AppearAction::Enter(binding.work_order_tag_id)
        }
        BindingPosition::BoundOpenInCell(binding, last) => {
            if last.cell_id == at {
                AppearAction::Hold
            } else {
                AppearAction::Transfer {
                    work_order_tag_id: binding.work_order_tag_id,
                    stale: last.id,
                }
            }
        }
        BindingPosition::BoundClosedInCell(binding, last) => {
            if last.cell_id == at {
                AppearAction::Reopen(last.id)
            } else {
                AppearAction::Enter(binding.work_order_tag_id)
            }
        }
    }
}

/// Summary of what one reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDelta {
    /// Codes that entered the cell (first entry, re-entry, or transfer)
    pub entered: Vec<EpcCode>,
    /// Codes whose closed interval in this cell was reopened
    pub reopened: Vec<EpcCode>,
    /// Codes whose open interval in this cell was closed
    pub departed: Vec<EpcCode>,
    /// Codes with no active binding, ignored
    pub ignored: Vec<EpcCode>,
}

impl SnapshotDelta {
    /// True when the snapshot matched the tracked state and nothing was
    /// written
    pub fn is_noop(&self) -> bool {
        self.entered.is_empty() && self.reopened.is_empty() && self.departed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(id: i64) -> ActiveBinding {
        ActiveBinding {
            work_order_tag_id: WorkOrderTagId(id),
            work_order_id: WorkOrderId(id),
            tag_id: TagId(id),
        }
    }

    fn last(id: i64, cell: i64) -> LastOccupancy {
        LastOccupancy {
            id: OccupancyId(id),
            cell_id: CellId(cell),
        }
    }

    #[test]
    fn test_unknown_code_is_ignored() {
        let action = appear_action(&BindingPosition::NoActiveBinding, CellId(1));
        assert_eq!(action, AppearAction::Ignore);
    }

    #[test]
    fn test_first_detection_enters() {
        let position = BindingPosition::BoundNoOccupancy(binding(5));
        assert_eq!(
            appear_action(&position, CellId(1)),
            AppearAction::Enter(WorkOrderTagId(5))
        );
    }

    #[test]
    fn test_open_elsewhere_transfers() {
        let position = BindingPosition::BoundOpenInCell(binding(5), last(9, 2));
        assert_eq!(
            appear_action(&position, CellId(1)),
            AppearAction::Transfer {
                work_order_tag_id: WorkOrderTagId(5),
                stale: OccupancyId(9),
            }
        );
    }

    #[test]
    fn test_open_here_holds() {
        let position = BindingPosition::BoundOpenInCell(binding(5), last(9, 1));
        assert_eq!(appear_action(&position, CellId(1)), AppearAction::Hold);
    }

    #[test]
    fn test_closed_here_reopens() {
        let position = BindingPosition::BoundClosedInCell(binding(5), last(9, 1));
        assert_eq!(
            appear_action(&position, CellId(1)),
            AppearAction::Reopen(OccupancyId(9))
        );
    }

    #[test]
    fn test_closed_elsewhere_enters() {
        let position = BindingPosition::BoundClosedInCell(binding(5), last(9, 2));
        assert_eq!(
            appear_action(&position, CellId(1)),
            AppearAction::Enter(WorkOrderTagId(5))
        );
    }

    #[test]
    fn test_delta_noop() {
        let mut delta = SnapshotDelta::default();
        assert!(delta.is_noop());

        delta.ignored.push(EpcCode::from("E1"));
        assert!(delta.is_noop());

        delta.entered.push(EpcCode::from("E2"));
        assert!(!delta.is_noop());
    }
}
