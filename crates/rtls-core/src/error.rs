//! Error types for rtls-core

use thiserror::Error;

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackError>;

/// Coarse classification of an error, for callers that map errors to
/// transport status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Internal,
}

/// Main error type for tracking operations
#[derive(Error, Debug)]
pub enum TrackError {
    /// Work-order lifecycle errors
    #[error("Work order error: {0}")]
    WorkOrder(#[from] WorkOrderError),

    /// Zone/cell/reader lookup errors
    #[error("Floor error: {0}")]
    Floor(#[from] FloorError),

    /// Malformed identifiers or payloads
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence-related errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl TrackError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackError::WorkOrder(e) => e.kind(),
            TrackError::Floor(_) => ErrorKind::NotFound,
            TrackError::InvalidInput(_) => ErrorKind::InvalidInput,
            TrackError::Persistence(_) => ErrorKind::Internal,
        }
    }

    /// True when the store reported a transient lock conflict and the
    /// operation can be retried with the same inputs
    pub fn is_busy(&self) -> bool {
        matches!(self, TrackError::Persistence(PersistenceError::Busy(_)))
    }
}

/// Work-order lifecycle errors
#[derive(Error, Debug)]
pub enum WorkOrderError {
    /// No work order with this job id
    #[error("Work order not found: {0}")]
    NotFound(String),

    /// Job id already used by an existing work order
    #[error("Job id already used: {0}")]
    JobIdTaken(String),

    /// Tag bound to an ongoing work order
    #[error("Tag {0} is already bound to an ongoing work order")]
    TagInUse(String),

    /// Finish on an already finished work order
    #[error("Work order {0} is already finished")]
    AlreadyFinished(String),

    /// Finish while the item is still inside a cell
    #[error("Work order {0} is still detected in a cell")]
    StillTracked(String),

    /// Finish on a work order that was never detected anywhere
    #[error("Work order {0} was never tracked in any cell")]
    NeverTracked(String),
}

impl WorkOrderError {
    fn kind(&self) -> ErrorKind {
        match self {
            WorkOrderError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Conflict,
        }
    }
}

/// Zone/cell/reader lookup errors
#[derive(Error, Debug)]
pub enum FloorError {
    /// Zone not found or retired
    #[error("Zone not found: {0}")]
    ZoneNotFound(i64),

    /// Cell not found or retired
    #[error("Cell not found: {0}")]
    CellNotFound(i64),

    /// No live cell carries this reader code
    #[error("No cell registered for reader: {0}")]
    ReaderNotFound(String),
}

/// Persistence-specific errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Transient lock conflict; retry with the same inputs
    #[error("Database busy: {0}")]
    Busy(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return PersistenceError::Busy(err.to_string());
            }
        }
        PersistenceError::Database(err.to_string())
    }
}

impl From<rusqlite::Error> for TrackError {
    fn from(err: rusqlite::Error) -> Self {
        TrackError::Persistence(PersistenceError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: TrackError = WorkOrderError::NotFound("J1".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: TrackError = WorkOrderError::TagInUse("E1".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: TrackError = FloorError::ZoneNotFound(7).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = TrackError::InvalidInput("empty job id".to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: TrackError = PersistenceError::Database("oops".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_busy_detection() {
        let err: TrackError = PersistenceError::Busy("locked".to_string()).into();
        assert!(err.is_busy());

        let err: TrackError = PersistenceError::Database("corrupt".to_string()).into();
        assert!(!err.is_busy());
    }
}
