//! RTLS Core - RFID location tracking for shop-floor work orders
//!
//! This crate provides the core functionality of the tracking engine:
//!
//! - **Floor**: Physical layout of zones and the monitored cells inside them
//! - **Tag**: RFID tag identities and raw reader token scrubbing
//! - **WorkOrder**: Work-order lifecycle with derived states (Created→Tracked⇄Exited→Finished)
//! - **Occupancy**: Timestamped presence intervals of a bound tag in a cell
//! - **Snapshot**: Full presence sets reported by readers, normalized for reconciliation
//! - **Reconcile**: Diffing a snapshot against open occupancies into enter/reopen/transfer/depart
//! - **Projection**: Read models for live zone maps, work-order detail, and status counts
//! - **Persistence**: SQLite-based storage with one immediate transaction per operation
//! - **ScanBuf**: Transient last-scan buffer feeding the registration kiosk
//! - **Config**: System-wide configuration for the server, the store, and the scan feed
//!
//! # Architecture
//!
//! Readers report the complete set of tags they currently see, not deltas.
//! Each report is reconciled transactionally against the store: appeared
//! codes are resolved to their active work-order binding and enter, reopen,
//! or transfer; disappeared codes have their interval closed; unknown codes
//! are ignored as noise. Work-order state is never stored, it is derived
//! from the completion timestamp and the shape of the latest interval, so
//! state and history cannot drift apart.

pub mod config;
pub mod error;
pub mod floor;
pub mod occupancy;
pub mod persistence;
pub mod projection;
pub mod reconcile;
pub mod scanbuf;
pub mod snapshot;
pub mod tag;
pub mod workorder;

pub use config::{RtlsConfig, ScanConfig, ServerConfig, StoreConfig};
pub use error::{ErrorKind, Result, TrackError};
pub use floor::{Cell, CellId, ReaderCode, Zone, ZoneId};
pub use occupancy::{Occupancy, OccupancyId};
pub use persistence::{Repository, Schema};
pub use projection::{
    ActivePosition, CellPositions, OccupancyVisit, StatusCounts, WorkOrderDetail, ZonePositions,
};
pub use reconcile::{AppearAction, BindingPosition, SnapshotDelta};
pub use scanbuf::{ScanBuffer, ScanRead};
pub use snapshot::Snapshot;
pub use tag::{EpcCode, Tag, TagId};
pub use workorder::{WorkOrder, WorkOrderId, WorkOrderState, WorkOrderTag, WorkOrderTagId};
