//! SQLite schema for tracking state storage

/// Schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// Get the complete schema SQL
    pub fn create_tables() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Zones table (shop floor areas)
CREATE TABLE IF NOT EXISTS zones (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    length REAL NOT NULL,
    width REAL NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Cells table (reader coverage areas inside a zone)
CREATE TABLE IF NOT EXISTS cells (
    id INTEGER PRIMARY KEY,
    zone_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    reader_code TEXT,
    radius REAL NOT NULL,
    position_x REAL,
    position_y REAL,
    created_at TEXT NOT NULL,
    deleted_at TEXT,
    FOREIGN KEY (zone_id) REFERENCES zones(id)
);

CREATE INDEX IF NOT EXISTS idx_cells_zone ON cells(zone_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_cells_reader ON cells(reader_code)
    WHERE reader_code IS NOT NULL AND deleted_at IS NULL;

-- Tags table (physical RFID tag identities)
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    epc_code TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Work orders table
CREATE TABLE IF NOT EXISTS work_orders (
    id INTEGER PRIMARY KEY,
    job_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    ended_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_work_orders_active ON work_orders(ended_at);

-- Work order tags table (binding of a work order to its physical tag)
CREATE TABLE IF NOT EXISTS work_order_tags (
    id INTEGER PRIMARY KEY,
    work_order_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (work_order_id) REFERENCES work_orders(id),
    FOREIGN KEY (tag_id) REFERENCES tags(id)
);

CREATE INDEX IF NOT EXISTS idx_work_order_tags_work_order ON work_order_tags(work_order_id);
CREATE INDEX IF NOT EXISTS idx_work_order_tags_tag ON work_order_tags(tag_id);

-- Occupancies table (presence intervals of a bound tag in a cell)
CREATE TABLE IF NOT EXISTS occupancies (
    id INTEGER PRIMARY KEY,
    cell_id INTEGER NOT NULL,
    work_order_tag_id INTEGER NOT NULL,
    entered_at TEXT NOT NULL,
    moved_at TEXT,
    FOREIGN KEY (cell_id) REFERENCES cells(id),
    FOREIGN KEY (work_order_tag_id) REFERENCES work_order_tags(id)
);

CREATE INDEX IF NOT EXISTS idx_occupancies_cell_open ON occupancies(cell_id)
    WHERE moved_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_occupancies_binding ON occupancies(work_order_tag_id, entered_at DESC);
"#
    }

    /// Get migration SQL for a specific version
    pub fn migration(from_version: u32, to_version: u32) -> Option<&'static str> {
        match (from_version, to_version) {
            // Add migrations here as the schema evolves
            // (0, 1) => Some("ALTER TABLE ..."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_valid() {
        let sql = Schema::create_tables();
        assert!(!sql.is_empty());
        assert!(sql.contains("CREATE TABLE"));
        assert!(sql.contains("occupancies"));
    }
}
