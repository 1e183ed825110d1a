//! Repository for tracking-state persistence
//!
//! Every mutating operation runs as one immediate transaction, so a
//! snapshot reconciliation or a lifecycle call either commits whole or
//! leaves no trace. Reads run against the current committed state.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::schema::{Schema, SCHEMA_VERSION};
use crate::error::{FloorError, PersistenceError, Result, TrackError, WorkOrderError};
use crate::floor::{Cell, CellId, ReaderCode, Zone, ZoneId};
use crate::occupancy::{Occupancy, OccupancyId};
use crate::projection::{
    ActivePosition, CellPositions, OccupancyVisit, StatusCounts, WorkOrderDetail, ZonePositions,
};
use crate::reconcile::{
    appear_action, ActiveBinding, AppearAction, BindingPosition, LastOccupancy, SnapshotDelta,
};
use crate::snapshot::Snapshot;
use crate::tag::{EpcCode, Tag, TagId};
use crate::workorder::{WorkOrder, WorkOrderId, WorkOrderState, WorkOrderTag, WorkOrderTagId};

/// A binding's latest occupancy with the fields candidate ranking needs
struct LatestOccupancyRow {
    id: OccupancyId,
    cell_id: CellId,
    entered_at: DateTime<Utc>,
    open: bool,
}

/// Repository for persisting tracking state
pub struct Repository {
    conn: rusqlite::Connection,
}

impl Repository {
    /// Create a new repository with the given database path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Create an in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// How long the connection waits on a locked database before the
    /// operation fails as busy
    pub fn set_busy_timeout(&self, ms: u32) -> Result<()> {
        self.conn.busy_timeout(Duration::from_millis(u64::from(ms)))?;
        Ok(())
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        // Check current schema version
        let current_version = self.get_schema_version().unwrap_or(0);

        if current_version == 0 {
            // Fresh database, create all tables
            self.conn.execute_batch(Schema::create_tables())?;
            self.set_schema_version(SCHEMA_VERSION)?;
        } else if current_version < SCHEMA_VERSION {
            // Run migrations
            for version in current_version..SCHEMA_VERSION {
                match Schema::migration(version, version + 1) {
                    Some(migration) => self.conn.execute_batch(migration)?,
                    None => {
                        return Err(PersistenceError::Migration(format!(
                            "no migration path from version {} to {}",
                            version,
                            version + 1
                        ))
                        .into());
                    }
                }
            }
            self.set_schema_version(SCHEMA_VERSION)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(PersistenceError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                actual: current_version,
            }
            .into());
        }

        Ok(())
    }

    fn get_schema_version(&self) -> Option<u32> {
        self.conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY applied_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .ok()
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        Ok(())
    }

    // ==================== Zone Operations ====================

    /// Register a new zone
    pub fn create_zone(&self, name: &str, length: f64, width: f64) -> Result<Zone> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackError::InvalidInput(
                "zone name must not be empty".to_string(),
            ));
        }
        if length <= 0.0 || width <= 0.0 {
            return Err(TrackError::InvalidInput(
                "zone dimensions must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO zones (name, length, width, created_at, deleted_at) VALUES (?1, ?2, ?3, ?4, NULL)",
            rusqlite::params![name, length, width, now],
        )?;

        Ok(Zone {
            id: ZoneId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            length,
            width,
            created_at: now,
            deleted_at: None,
        })
    }

    /// Get a zone by id, retired ones included
    pub fn get_zone(&self, id: ZoneId) -> Result<Option<Zone>> {
        let result = self.conn.query_row(
            "SELECT id, name, length, width, created_at, deleted_at FROM zones WHERE id = ?1",
            [id.0],
            Self::row_to_zone,
        );

        match result {
            Ok(zone) => Ok(Some(zone)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    /// Get all zones
    pub fn get_all_zones(&self) -> Result<Vec<Zone>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, length, width, created_at, deleted_at FROM zones ORDER BY id",
        )?;

        let zones = stmt
            .query_map([], Self::row_to_zone)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(zones)
    }

    /// Soft-retire a zone; its history stays readable but it disappears
    /// from projections
    pub fn retire_zone(&self, id: ZoneId) -> Result<()> {
        let zone = self
            .get_zone(id)?
            .ok_or(FloorError::ZoneNotFound(id.0))?;
        if zone.is_retired() {
            return Ok(());
        }

        self.conn.execute(
            "UPDATE zones SET deleted_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now(), id.0],
        )?;
        Ok(())
    }

    fn row_to_zone(row: &rusqlite::Row) -> rusqlite::Result<Zone> {
        Ok(Zone {
            id: ZoneId(row.get(0)?),
            name: row.get(1)?,
            length: row.get(2)?,
            width: row.get(3)?,
            created_at: row.get(4)?,
            deleted_at: row.get(5)?,
        })
    }

    // ==================== Cell Operations ====================

    /// Register a new cell inside a zone
    pub fn create_cell(
        &self,
        zone_id: ZoneId,
        name: &str,
        reader_code: Option<&str>,
        radius: f64,
        position_x: Option<f64>,
        position_y: Option<f64>,
    ) -> Result<Cell> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackError::InvalidInput(
                "cell name must not be empty".to_string(),
            ));
        }

        let zone = self
            .get_zone(zone_id)?
            .ok_or(FloorError::ZoneNotFound(zone_id.0))?;
        if zone.is_retired() {
            return Err(FloorError::ZoneNotFound(zone_id.0).into());
        }

        if let Some(code) = reader_code {
            if self.get_cell_by_reader(code)?.is_some() {
                return Err(TrackError::InvalidInput(format!(
                    "reader {} is already assigned to a cell",
                    code
                )));
            }
        }

        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO cells
            (zone_id, name, reader_code, radius, position_x, position_y, created_at, deleted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)
            "#,
            rusqlite::params![zone_id.0, name, reader_code, radius, position_x, position_y, now],
        )?;

        Ok(Cell {
            id: CellId(self.conn.last_insert_rowid()),
            zone_id,
            name: name.to_string(),
            reader_code: reader_code.map(|c| ReaderCode(c.to_string())),
            radius,
            position_x,
            position_y,
            created_at: now,
            deleted_at: None,
        })
    }

    /// Get a cell by id, retired ones included
    pub fn get_cell(&self, id: CellId) -> Result<Option<Cell>> {
        let result = self.conn.query_row(
            "SELECT id, zone_id, name, reader_code, radius, position_x, position_y, created_at, deleted_at FROM cells WHERE id = ?1",
            [id.0],
            Self::row_to_cell,
        );

        match result {
            Ok(cell) => Ok(Some(cell)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    /// Get the live cell fed by a physical reader
    pub fn get_cell_by_reader(&self, reader_code: &str) -> Result<Option<Cell>> {
        let result = self.conn.query_row(
            "SELECT id, zone_id, name, reader_code, radius, position_x, position_y, created_at, deleted_at FROM cells WHERE reader_code = ?1 AND deleted_at IS NULL",
            [reader_code],
            Self::row_to_cell,
        );

        match result {
            Ok(cell) => Ok(Some(cell)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    /// Get the live cells of a zone
    pub fn get_cells_in_zone(&self, zone_id: ZoneId) -> Result<Vec<Cell>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, zone_id, name, reader_code, radius, position_x, position_y, created_at, deleted_at FROM cells WHERE zone_id = ?1 AND deleted_at IS NULL ORDER BY id",
        )?;

        let cells = stmt
            .query_map([zone_id.0], Self::row_to_cell)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cells)
    }

    /// Soft-retire a cell, closing whatever is still open inside it
    pub fn retire_cell(&mut self, id: CellId) -> Result<()> {
        let cell = self
            .get_cell(id)?
            .ok_or(FloorError::CellNotFound(id.0))?;
        if cell.is_retired() {
            return Ok(());
        }

        let now = Utc::now();
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            "UPDATE occupancies SET moved_at = ?1 WHERE cell_id = ?2 AND moved_at IS NULL",
            rusqlite::params![now, id.0],
        )?;
        tx.execute(
            "UPDATE cells SET deleted_at = ?1 WHERE id = ?2",
            rusqlite::params![now, id.0],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn row_to_cell(row: &rusqlite::Row) -> rusqlite::Result<Cell> {
        let reader_code: Option<String> = row.get(3)?;
        Ok(Cell {
            id: CellId(row.get(0)?),
            zone_id: ZoneId(row.get(1)?),
            name: row.get(2)?,
            reader_code: reader_code.map(ReaderCode),
            radius: row.get(4)?,
            position_x: row.get(5)?,
            position_y: row.get(6)?,
            created_at: row.get(7)?,
            deleted_at: row.get(8)?,
        })
    }

    // ==================== Tag Operations ====================

    /// Get a tag by its EPC code
    pub fn get_tag(&self, code: &EpcCode) -> Result<Option<Tag>> {
        let result = self.conn.query_row(
            "SELECT id, epc_code, created_at FROM tags WHERE epc_code = ?1",
            [code.as_str()],
            Self::row_to_tag,
        );

        match result {
            Ok(tag) => Ok(Some(tag)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    /// Get the tag binding of a work order
    pub fn get_binding_for_work_order(&self, id: WorkOrderId) -> Result<Option<WorkOrderTag>> {
        let result = self.conn.query_row(
            "SELECT id, work_order_id, tag_id, created_at FROM work_order_tags WHERE work_order_id = ?1 ORDER BY id DESC LIMIT 1",
            [id.0],
            Self::row_to_work_order_tag,
        );

        match result {
            Ok(binding) => Ok(Some(binding)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: TagId(row.get(0)?),
            epc_code: EpcCode(row.get(1)?),
            created_at: row.get(2)?,
        })
    }

    fn row_to_work_order_tag(row: &rusqlite::Row) -> rusqlite::Result<WorkOrderTag> {
        Ok(WorkOrderTag {
            id: WorkOrderTagId(row.get(0)?),
            work_order_id: WorkOrderId(row.get(1)?),
            tag_id: TagId(row.get(2)?),
            created_at: row.get(3)?,
        })
    }

    // ==================== Work Order Operations ====================

    /// Register a new work order bound to a physical tag
    ///
    /// The job id must be unused. The tag must not be bound to an ongoing
    /// work order; when its previous work order has already left every
    /// cell, that one is closed here and the tag identity is reused.
    pub fn create_work_order(&mut self, job_id: &str, tag_code: &str) -> Result<WorkOrder> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(TrackError::InvalidInput(
                "job id must not be empty".to_string(),
            ));
        }
        let code = EpcCode::scrub(tag_code).ok_or_else(|| {
            TrackError::InvalidInput("tag code must not be empty".to_string())
        })?;

        let now = Utc::now();
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let taken = match tx.query_row(
            "SELECT 1 FROM work_orders WHERE job_id = ?1",
            [job_id],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(_) => true,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(PersistenceError::from(e).into()),
        };
        if taken {
            return Err(WorkOrderError::JobIdTaken(job_id.to_string()).into());
        }

        let tag_id = match Self::binding_position(&tx, &code)? {
            BindingPosition::NoActiveBinding => Self::ensure_tag(&tx, &code, now)?,
            BindingPosition::BoundNoOccupancy(_) | BindingPosition::BoundOpenInCell(_, _) => {
                return Err(WorkOrderError::TagInUse(code.to_string()).into());
            }
            BindingPosition::BoundClosedInCell(binding, _) => {
                // The previous job already left every cell; close it here
                // and hand its tag to the new one
                tx.execute(
                    "UPDATE work_orders SET ended_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, binding.work_order_id.0],
                )?;
                binding.tag_id
            }
        };

        tx.execute(
            "INSERT INTO work_orders (job_id, created_at, ended_at) VALUES (?1, ?2, NULL)",
            rusqlite::params![job_id, now],
        )?;
        let work_order_id = WorkOrderId(tx.last_insert_rowid());

        tx.execute(
            "INSERT INTO work_order_tags (work_order_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![work_order_id.0, tag_id.0, now],
        )?;

        tx.commit()?;

        Ok(WorkOrder {
            id: work_order_id,
            job_id: job_id.to_string(),
            created_at: now,
            ended_at: None,
        })
    }

    /// Complete a work order
    ///
    /// Only valid once the item has been tracked at least once and has
    /// left every cell.
    pub fn finish_work_order(&mut self, job_id: &str) -> Result<WorkOrder> {
        let job_id = job_id.trim();
        let now = Utc::now();
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut work_order = match tx.query_row(
            "SELECT id, job_id, created_at, ended_at FROM work_orders WHERE job_id = ?1",
            [job_id],
            Self::row_to_work_order,
        ) {
            Ok(wo) => wo,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(WorkOrderError::NotFound(job_id.to_string()).into());
            }
            Err(e) => return Err(PersistenceError::from(e).into()),
        };

        let latest_open = match tx.query_row(
            "SELECT o.moved_at FROM occupancies o \
             JOIN work_order_tags wot ON wot.id = o.work_order_tag_id \
             WHERE wot.work_order_id = ?1 \
             ORDER BY o.entered_at DESC, o.id DESC LIMIT 1",
            [work_order.id.0],
            |row| row.get::<_, Option<DateTime<Utc>>>(0),
        ) {
            Ok(moved_at) => Some(moved_at.is_none()),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(PersistenceError::from(e).into()),
        };

        match WorkOrderState::derive(!work_order.is_active(), latest_open) {
            WorkOrderState::Finished => {
                return Err(WorkOrderError::AlreadyFinished(job_id.to_string()).into());
            }
            WorkOrderState::Tracked => {
                return Err(WorkOrderError::StillTracked(job_id.to_string()).into());
            }
            WorkOrderState::Created => {
                return Err(WorkOrderError::NeverTracked(job_id.to_string()).into());
            }
            WorkOrderState::Exited => {}
        }

        tx.execute(
            "UPDATE work_orders SET ended_at = ?1 WHERE id = ?2",
            rusqlite::params![now, work_order.id.0],
        )?;
        tx.commit()?;

        work_order.ended_at = Some(now);
        Ok(work_order)
    }

    /// Get a work order by job id
    pub fn get_work_order(&self, job_id: &str) -> Result<Option<WorkOrder>> {
        let result = self.conn.query_row(
            "SELECT id, job_id, created_at, ended_at FROM work_orders WHERE job_id = ?1",
            [job_id.trim()],
            Self::row_to_work_order,
        );

        match result {
            Ok(work_order) => Ok(Some(work_order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    /// Get a work order with its derived state and movement history
    pub fn get_work_order_detail(&self, job_id: &str) -> Result<Option<WorkOrderDetail>> {
        let work_order = match self.get_work_order(job_id)? {
            Some(wo) => wo,
            None => return Ok(None),
        };

        let epc_code = match self.conn.query_row(
            "SELECT t.epc_code FROM work_order_tags wot \
             JOIN tags t ON t.id = wot.tag_id \
             WHERE wot.work_order_id = ?1 ORDER BY wot.id DESC LIMIT 1",
            [work_order.id.0],
            |row| row.get::<_, String>(0),
        ) {
            Ok(code) => Some(code),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(PersistenceError::from(e).into()),
        };

        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, o.entered_at, o.moved_at FROM occupancies o \
             JOIN work_order_tags wot ON wot.id = o.work_order_tag_id \
             JOIN cells c ON c.id = o.cell_id \
             WHERE wot.work_order_id = ?1 \
             ORDER BY o.entered_at ASC, o.id ASC",
        )?;
        let visits = stmt
            .query_map([work_order.id.0], |row| {
                Ok(OccupancyVisit {
                    cell_id: CellId(row.get(0)?),
                    cell_name: row.get(1)?,
                    entered_at: row.get(2)?,
                    moved_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let latest_open = visits.last().map(|visit| visit.moved_at.is_none());
        let state = WorkOrderState::derive(!work_order.is_active(), latest_open);

        Ok(Some(WorkOrderDetail {
            work_order_id: work_order.id,
            job_id: work_order.job_id,
            state,
            epc_code,
            created_at: work_order.created_at,
            ended_at: work_order.ended_at,
            visits,
        }))
    }

    fn row_to_work_order(row: &rusqlite::Row) -> rusqlite::Result<WorkOrder> {
        Ok(WorkOrder {
            id: WorkOrderId(row.get(0)?),
            job_id: row.get(1)?,
            created_at: row.get(2)?,
            ended_at: row.get(3)?,
        })
    }

    // ==================== Reconcile Operations ====================

    /// Reconcile a cell against the full set of codes its reader reports
    ///
    /// Newly appeared codes enter, reopen, or transfer according to where
    /// their binding currently stands; disappeared codes have their open
    /// interval closed; codes present in both sets are left untouched.
    /// Unknown codes are reader noise and are ignored. Repeating the same
    /// snapshot is a no-op.
    pub fn reconcile_cell(&mut self, cell_id: CellId, snapshot: &Snapshot) -> Result<SnapshotDelta> {
        let now = Utc::now();
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let cell = match tx.query_row(
            "SELECT id, zone_id, name, reader_code, radius, position_x, position_y, created_at, deleted_at FROM cells WHERE id = ?1",
            [cell_id.0],
            Self::row_to_cell,
        ) {
            Ok(cell) => cell,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(FloorError::CellNotFound(cell_id.0).into());
            }
            Err(e) => return Err(PersistenceError::from(e).into()),
        };
        if cell.is_retired() {
            return Err(FloorError::CellNotFound(cell_id.0).into());
        }

        // Codes with an open interval in this cell right now
        let tracked: BTreeMap<EpcCode, OccupancyId> = {
            let mut stmt = tx.prepare(
                "SELECT t.epc_code, o.id FROM occupancies o \
                 JOIN work_order_tags wot ON wot.id = o.work_order_tag_id \
                 JOIN tags t ON t.id = wot.tag_id \
                 WHERE o.cell_id = ?1 AND o.moved_at IS NULL",
            )?;
            let rows = stmt
                .query_map([cell_id.0], |row| {
                    Ok((EpcCode(row.get(0)?), OccupancyId(row.get(1)?)))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().collect()
        };

        let mut delta = SnapshotDelta::default();

        for code in snapshot.iter() {
            if tracked.contains_key(code) {
                continue;
            }
            let position = Self::binding_position(&tx, code)?;
            match appear_action(&position, cell_id) {
                AppearAction::Ignore => delta.ignored.push(code.clone()),
                AppearAction::Enter(binding_id) => {
                    Self::insert_occupancy(&tx, cell_id, binding_id, now)?;
                    delta.entered.push(code.clone());
                }
                AppearAction::Transfer {
                    work_order_tag_id,
                    stale,
                } => {
                    tx.execute(
                        "UPDATE occupancies SET moved_at = ?1 WHERE id = ?2",
                        rusqlite::params![now, stale.0],
                    )?;
                    Self::insert_occupancy(&tx, cell_id, work_order_tag_id, now)?;
                    delta.entered.push(code.clone());
                }
                AppearAction::Reopen(occupancy_id) => {
                    tx.execute(
                        "UPDATE occupancies SET moved_at = NULL WHERE id = ?1",
                        [occupancy_id.0],
                    )?;
                    delta.reopened.push(code.clone());
                }
                AppearAction::Hold => {}
            }
        }

        for (code, occupancy_id) in &tracked {
            if !snapshot.contains(code) {
                tx.execute(
                    "UPDATE occupancies SET moved_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, occupancy_id.0],
                )?;
                delta.departed.push(code.clone());
            }
        }

        tx.commit()?;
        Ok(delta)
    }

    /// Reconcile the cell fed by a physical reader
    pub fn reconcile_reader(
        &mut self,
        reader_code: &str,
        snapshot: &Snapshot,
    ) -> Result<SnapshotDelta> {
        let cell = self
            .get_cell_by_reader(reader_code)?
            .ok_or_else(|| FloorError::ReaderNotFound(reader_code.to_string()))?;
        self.reconcile_cell(cell.id, snapshot)
    }

    /// Resolve where a tag code currently stands: its preferred active
    /// binding and that binding's latest occupancy
    fn binding_position(conn: &rusqlite::Connection, code: &EpcCode) -> Result<BindingPosition> {
        let candidates = {
            let mut stmt = conn.prepare(
                "SELECT wot.id, wot.work_order_id, wot.tag_id FROM work_order_tags wot \
                 JOIN tags t ON t.id = wot.tag_id \
                 JOIN work_orders wo ON wo.id = wot.work_order_id \
                 WHERE t.epc_code = ?1 AND wo.ended_at IS NULL",
            )?;
            let rows = stmt
                .query_map([code.as_str()], |row| {
                    Ok(ActiveBinding {
                        work_order_tag_id: WorkOrderTagId(row.get(0)?),
                        work_order_id: WorkOrderId(row.get(1)?),
                        tag_id: TagId(row.get(2)?),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut ranked = Vec::with_capacity(candidates.len());
        for binding in candidates {
            let latest = Self::latest_occupancy(conn, binding.work_order_tag_id)?;
            ranked.push((binding, latest));
        }

        // An in-flight binding outranks a stale one: open occupancy first,
        // then most recent entry, then newest binding
        let best = ranked.into_iter().max_by_key(|(binding, latest)| {
            (
                latest.as_ref().map_or(false, |l| l.open),
                latest.as_ref().map(|l| l.entered_at),
                binding.work_order_tag_id.0,
            )
        });

        Ok(match best {
            None => BindingPosition::NoActiveBinding,
            Some((binding, None)) => BindingPosition::BoundNoOccupancy(binding),
            Some((binding, Some(latest))) => {
                let last = LastOccupancy {
                    id: latest.id,
                    cell_id: latest.cell_id,
                };
                if latest.open {
                    BindingPosition::BoundOpenInCell(binding, last)
                } else {
                    BindingPosition::BoundClosedInCell(binding, last)
                }
            }
        })
    }

    fn latest_occupancy(
        conn: &rusqlite::Connection,
        binding_id: WorkOrderTagId,
    ) -> Result<Option<LatestOccupancyRow>> {
        let result = conn.query_row(
            "SELECT id, cell_id, entered_at, moved_at FROM occupancies \
             WHERE work_order_tag_id = ?1 ORDER BY entered_at DESC, id DESC LIMIT 1",
            [binding_id.0],
            |row| {
                Ok(LatestOccupancyRow {
                    id: OccupancyId(row.get(0)?),
                    cell_id: CellId(row.get(1)?),
                    entered_at: row.get(2)?,
                    open: row.get::<_, Option<DateTime<Utc>>>(3)?.is_none(),
                })
            },
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    fn ensure_tag(
        conn: &rusqlite::Connection,
        code: &EpcCode,
        now: DateTime<Utc>,
    ) -> Result<TagId> {
        let existing = conn.query_row(
            "SELECT id FROM tags WHERE epc_code = ?1",
            [code.as_str()],
            |row| row.get::<_, i64>(0),
        );

        match existing {
            Ok(id) => Ok(TagId(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                conn.execute(
                    "INSERT INTO tags (epc_code, created_at) VALUES (?1, ?2)",
                    rusqlite::params![code.as_str(), now],
                )?;
                Ok(TagId(conn.last_insert_rowid()))
            }
            Err(e) => Err(PersistenceError::from(e).into()),
        }
    }

    fn insert_occupancy(
        conn: &rusqlite::Connection,
        cell_id: CellId,
        binding_id: WorkOrderTagId,
        now: DateTime<Utc>,
    ) -> Result<OccupancyId> {
        conn.execute(
            "INSERT INTO occupancies (cell_id, work_order_tag_id, entered_at, moved_at) VALUES (?1, ?2, ?3, NULL)",
            rusqlite::params![cell_id.0, binding_id.0, now],
        )?;
        Ok(OccupancyId(conn.last_insert_rowid()))
    }

    // ==================== Projection Operations ====================

    /// The live view of a zone: every live cell with the work orders
    /// currently present inside it
    pub fn project_zone(&self, zone_id: ZoneId) -> Result<ZonePositions> {
        let zone = match self.get_zone(zone_id)? {
            Some(zone) if !zone.is_retired() => zone,
            _ => return Err(FloorError::ZoneNotFound(zone_id.0).into()),
        };

        let cells = self.get_cells_in_zone(zone_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT wo.id, wo.job_id, t.epc_code, wo.created_at, o.entered_at FROM occupancies o \
             JOIN work_order_tags wot ON wot.id = o.work_order_tag_id \
             JOIN work_orders wo ON wo.id = wot.work_order_id \
             JOIN tags t ON t.id = wot.tag_id \
             WHERE o.cell_id = ?1 AND o.moved_at IS NULL \
             ORDER BY o.entered_at ASC, o.id ASC",
        )?;

        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            let positions = stmt
                .query_map([cell.id.0], |row| {
                    Ok(ActivePosition {
                        work_order_id: WorkOrderId(row.get(0)?),
                        job_id: row.get(1)?,
                        epc_code: row.get(2)?,
                        created_at: row.get(3)?,
                        entered_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            out.push(CellPositions {
                cell_id: cell.id,
                cell_name: cell.name,
                radius: cell.radius,
                position_x: cell.position_x,
                position_y: cell.position_y,
                positions,
            });
        }

        Ok(ZonePositions {
            zone_id: zone.id,
            zone_name: zone.name,
            length: zone.length,
            width: zone.width,
            generated_at: Utc::now(),
            cells: out,
        })
    }

    /// The open occupancies of one cell
    pub fn get_open_occupancies_in_cell(&self, cell_id: CellId) -> Result<Vec<Occupancy>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, cell_id, work_order_tag_id, entered_at, moved_at FROM occupancies \
             WHERE cell_id = ?1 AND moved_at IS NULL ORDER BY entered_at ASC, id ASC",
        )?;

        let occupancies = stmt
            .query_map([cell_id.0], Self::row_to_occupancy)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(occupancies)
    }

    /// Row counts for the status endpoint
    pub fn status_counts(&self) -> Result<StatusCounts> {
        let zones: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM zones WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        let cells: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cells WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        let active_work_orders: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_orders WHERE ended_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        let open_occupancies: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM occupancies WHERE moved_at IS NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(StatusCounts {
            zones: zones as u64,
            cells: cells as u64,
            active_work_orders: active_work_orders as u64,
            open_occupancies: open_occupancies as u64,
        })
    }

    fn row_to_occupancy(row: &rusqlite::Row) -> rusqlite::Result<Occupancy> {
        Ok(Occupancy {
            id: OccupancyId(row.get(0)?),
            cell_id: CellId(row.get(1)?),
            work_order_tag_id: WorkOrderTagId(row.get(2)?),
            entered_at: row.get(3)?,
            moved_at: row.get(4)?,
        })
    }
}
