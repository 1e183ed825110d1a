//! Property-based invariant tests
//!
//! Random interleavings of snapshots, registrations, and finishes must
//! never leave a tag or a job visible in two places, and replaying a
//! snapshot must never write anything.

use std::collections::HashSet;

use proptest::prelude::*;

use rtls_core::error::ErrorKind;
use rtls_core::floor::{Cell, Zone};
use rtls_core::persistence::Repository;
use rtls_core::snapshot::Snapshot;

const CODES: [&str; 3] = ["E1", "E2", "E3"];

#[derive(Debug, Clone)]
enum Op {
    Observe { cell: usize, codes: Vec<usize> },
    Create { job: usize, code: usize },
    Finish { job: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, proptest::collection::vec(0..CODES.len(), 0..4))
            .prop_map(|(cell, codes)| Op::Observe { cell, codes }),
        (0..8usize, 0..CODES.len()).prop_map(|(job, code)| Op::Create { job, code }),
        (0..8usize).prop_map(|job| Op::Finish { job }),
    ]
}

fn floor() -> (Repository, Zone, [Cell; 2]) {
    let repo = Repository::in_memory().unwrap();
    let zone = repo.create_zone("Hall A", 40.0, 25.0).unwrap();
    let drill = repo
        .create_cell(zone.id, "Drill", Some("RDR-01"), 2.5, None, None)
        .unwrap();
    let paint = repo
        .create_cell(zone.id, "Paint", Some("RDR-02"), 2.5, None, None)
        .unwrap();
    (repo, zone, [drill, paint])
}

fn observe(codes: &[usize]) -> Snapshot {
    Snapshot::from_raw_tokens(codes.iter().map(|i| CODES[*i]))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_no_tag_or_job_is_ever_open_twice(ops in proptest::collection::vec(op_strategy(), 1..32)) {
        let (mut repo, zone, cells) = floor();

        for op in ops {
            match op {
                Op::Observe { cell, codes } => {
                    repo.reconcile_cell(cells[cell].id, &observe(&codes)).unwrap();
                }
                Op::Create { job, code } => {
                    if let Err(e) = repo.create_work_order(&format!("J{}", job), CODES[code]) {
                        prop_assert_eq!(e.kind(), ErrorKind::Conflict, "unexpected create failure: {}", e);
                    }
                }
                Op::Finish { job } => {
                    if let Err(e) = repo.finish_work_order(&format!("J{}", job)) {
                        prop_assert!(
                            matches!(e.kind(), ErrorKind::Conflict | ErrorKind::NotFound),
                            "unexpected finish failure: {}",
                            e
                        );
                    }
                }
            }

            let projection = repo.project_zone(zone.id).unwrap();
            let mut seen_codes = HashSet::new();
            let mut seen_jobs = HashSet::new();
            for cell in &projection.cells {
                for position in &cell.positions {
                    prop_assert!(
                        seen_codes.insert(position.epc_code.clone()),
                        "tag {} is open in two places",
                        position.epc_code
                    );
                    prop_assert!(
                        seen_jobs.insert(position.job_id.clone()),
                        "job {} is open in two places",
                        position.job_id
                    );
                }
            }
        }
    }

    #[test]
    fn test_replayed_snapshot_is_a_noop(
        first in proptest::collection::vec(0..CODES.len(), 0..4),
        second in proptest::collection::vec(0..CODES.len(), 0..4),
    ) {
        let (mut repo, _, cells) = floor();
        for (i, code) in CODES.iter().enumerate() {
            repo.create_work_order(&format!("J{}", i), code).unwrap();
        }

        repo.reconcile_cell(cells[0].id, &observe(&first)).unwrap();
        repo.reconcile_cell(cells[0].id, &observe(&second)).unwrap();

        let replay = repo.reconcile_cell(cells[0].id, &observe(&second)).unwrap();
        prop_assert!(replay.is_noop(), "replay changed state: {:?}", replay);
    }
}
