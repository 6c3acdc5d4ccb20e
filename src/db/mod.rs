pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// True when the underlying SQLite error is a UNIQUE constraint hit on
    /// the given index or column. Used to turn the active-slot index
    /// violation into the authoritative conflict signal.
    pub fn is_unique_violation_on(&self, name: &str) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, Some(msg))) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains(name)
            }
            _ => false,
        }
    }
}
