//! Work-order lifecycle integration tests
//!
//! Covers registration, the tag-reuse rules, and the finish gating against
//! derived states.

use rtls_core::error::{ErrorKind, TrackError, WorkOrderError};
use rtls_core::floor::Cell;
use rtls_core::persistence::Repository;
use rtls_core::snapshot::Snapshot;
use rtls_core::tag::EpcCode;
use rtls_core::workorder::WorkOrderState;

fn repo_with_cell() -> (Repository, Cell) {
    let repo = Repository::in_memory().unwrap();
    let zone = repo.create_zone("Hall A", 40.0, 25.0).unwrap();
    let cell = repo
        .create_cell(zone.id, "Drill", Some("RDR-01"), 2.5, None, None)
        .unwrap();
    (repo, cell)
}

fn snap(codes: &[&str]) -> Snapshot {
    Snapshot::from_raw_tokens(codes.iter().copied())
}

// === Creation ===

#[test]
fn test_create_work_order() {
    let (mut repo, _) = repo_with_cell();

    let wo = repo.create_work_order("J1", "E1").unwrap();
    assert_eq!(wo.job_id, "J1");
    assert!(wo.is_active());

    let detail = repo.get_work_order_detail("J1").unwrap().unwrap();
    assert_eq!(detail.state, WorkOrderState::Created);
    assert_eq!(detail.epc_code.as_deref(), Some("E1"));
    assert!(detail.visits.is_empty());
}

#[test]
fn test_create_scrubs_the_tag_code() {
    let (mut repo, _) = repo_with_cell();
    repo.create_work_order("J1", " epc[E280 1160] ").unwrap();

    let tag = repo.get_tag(&EpcCode::from("E2801160")).unwrap();
    assert!(tag.is_some());
}

#[test]
fn test_create_rejects_duplicate_job_id() {
    let (mut repo, _) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();

    let err = repo.create_work_order("J1", "E2").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::JobIdTaken(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_create_rejects_blank_inputs() {
    let (mut repo, _) = repo_with_cell();

    let err = repo.create_work_order("   ", "E1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = repo.create_work_order("J1", " epc[] ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

// === Tag reuse rules ===

#[test]
fn test_tag_bound_but_never_tracked_is_in_use() {
    let (mut repo, _) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();

    let err = repo.create_work_order("J2", "E1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::TagInUse(_))
    ));
}

#[test]
fn test_tag_currently_inside_a_cell_is_in_use() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();

    let err = repo.create_work_order("J2", "E1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::TagInUse(_))
    ));
}

#[test]
fn test_tag_reuse_after_exit_auto_closes_prior_job() {
    let (mut repo, cell) = repo_with_cell();
    let first = repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();

    // No explicit finish needed once the item has left every cell
    let second = repo.create_work_order("J2", "E1").unwrap();

    let prior = repo.get_work_order("J1").unwrap().unwrap();
    assert!(!prior.is_active(), "prior job is closed by the reuse");
    assert!(repo.get_work_order("J2").unwrap().unwrap().is_active());

    // Both bindings point at the same physical tag
    let first_binding = repo.get_binding_for_work_order(first.id).unwrap().unwrap();
    let second_binding = repo.get_binding_for_work_order(second.id).unwrap().unwrap();
    assert_eq!(first_binding.tag_id, second_binding.tag_id);
}

#[test]
fn test_tag_reuse_after_explicit_finish() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();
    repo.finish_work_order("J1").unwrap();

    repo.create_work_order("J2", "E1").unwrap();
    let detail = repo.get_work_order_detail("J2").unwrap().unwrap();
    assert_eq!(detail.state, WorkOrderState::Created);
    assert_eq!(detail.epc_code.as_deref(), Some("E1"));
}

#[test]
fn test_reused_tag_tracks_under_new_job_only() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();
    repo.create_work_order("J2", "E1").unwrap();

    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();

    let old = repo.get_work_order_detail("J1").unwrap().unwrap();
    assert_eq!(old.visits.len(), 1, "detections no longer accrue to the closed job");
    let new = repo.get_work_order_detail("J2").unwrap().unwrap();
    assert_eq!(new.state, WorkOrderState::Tracked);
    assert_eq!(new.visits.len(), 1);
}

// === Finish gating ===

#[test]
fn test_finish_unknown_job() {
    let (mut repo, _) = repo_with_cell();
    let err = repo.finish_work_order("J404").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::NotFound(_))
    ));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_finish_never_tracked_job() {
    let (mut repo, _) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();

    let err = repo.finish_work_order("J1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::NeverTracked(_))
    ));
}

#[test]
fn test_finish_while_still_inside() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();

    let err = repo.finish_work_order("J1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::StillTracked(_))
    ));
}

#[test]
fn test_finish_after_exit() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();

    let finished = repo.finish_work_order("J1").unwrap();
    assert!(finished.ended_at.is_some());
    assert_eq!(
        repo.get_work_order_detail("J1").unwrap().unwrap().state,
        WorkOrderState::Finished
    );
}

#[test]
fn test_finish_twice() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();
    repo.finish_work_order("J1").unwrap();

    let err = repo.finish_work_order("J1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::AlreadyFinished(_))
    ));
}

#[test]
fn test_reentry_blocks_finish_until_next_exit() {
    let (mut repo, cell) = repo_with_cell();
    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();

    // Flickers back in before anyone finishes it
    repo.reconcile_cell(cell.id, &snap(&["E1"])).unwrap();
    let err = repo.finish_work_order("J1").unwrap_err();
    assert!(matches!(
        err,
        TrackError::WorkOrder(WorkOrderError::StillTracked(_))
    ));

    repo.reconcile_cell(cell.id, &Snapshot::empty()).unwrap();
    assert!(repo.finish_work_order("J1").is_ok());
}

// === Detail ===

#[test]
fn test_detail_carries_full_movement_history() {
    let mut repo = Repository::in_memory().unwrap();
    let zone = repo.create_zone("Hall A", 40.0, 25.0).unwrap();
    let drill = repo
        .create_cell(zone.id, "Drill", Some("RDR-01"), 2.5, None, None)
        .unwrap();
    let paint = repo
        .create_cell(zone.id, "Paint", Some("RDR-02"), 2.5, None, None)
        .unwrap();

    repo.create_work_order("J1", "E1").unwrap();
    repo.reconcile_cell(drill.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(paint.id, &snap(&["E1"])).unwrap();
    repo.reconcile_cell(paint.id, &Snapshot::empty()).unwrap();

    let detail = repo.get_work_order_detail("J1").unwrap().unwrap();
    assert_eq!(detail.visits.len(), 2);
    assert_eq!(detail.visits[0].cell_name, "Drill");
    assert!(detail.visits[0].moved_at.is_some());
    assert_eq!(detail.visits[1].cell_name, "Paint");
    assert!(detail.visits[1].moved_at.is_some());
    assert_eq!(detail.state, WorkOrderState::Exited);
}

#[test]
fn test_detail_of_unknown_job() {
    let (repo, _) = repo_with_cell();
    assert!(repo.get_work_order_detail("J404").unwrap().is_none());
}
