//! Typed error hierarchy for the board core.
//!
//! Every core operation returns [`BoardError`]. The HTTP layer maps the
//! variants onto status codes; the CLI wraps them in `anyhow` context.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// The kind of entity a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Project,
    Board,
    Column,
    Task,
    Tag,
    User,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Board => "board",
            Self::Column => "column",
            Self::Task => "task",
            Self::Tag => "tag",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the board mutation service.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("{operation} gave up after {attempts} attempts due to lock contention")]
    Conflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoardError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// True when the store refused the transaction because another writer
    /// holds the lock. These are the only failures worth retrying.
    pub fn is_contention(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
