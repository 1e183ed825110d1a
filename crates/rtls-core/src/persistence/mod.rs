//! Persistence layer for tracking state
//!
//! Provides SQLite-backed storage for zones, cells, tags, work orders, and
//! occupancy intervals.

mod repository;
mod schema;

pub use repository::Repository;
pub use schema::Schema;
