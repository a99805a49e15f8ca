//! Unified error type for the marketplace core.
//!
//! Every workflow function returns [`Result`]. Callers that need to map a failure
//! onto a transport status use [`Error::kind`], which folds the variants into the
//! five outcome kinds the workflows distinguish.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Outcome classes a workflow failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced entity is absent or soft-deleted
    NotFound,
    /// Uniqueness violation or the target state is already reached
    Conflict,
    /// Caller-supplied data fails a domain precondition
    BadRequest,
    /// Ownership or authorization mismatch
    Forbidden,
    /// Collaborator or storage failure not attributable to caller input
    InternalError,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Operation timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Classifies the error. Unique-index violations raised by the store count as
    /// `Conflict`, since they are the atomic form of a uniqueness check.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Database(err) if is_unique_violation(err) => ErrorKind::Conflict,
            Self::Internal { .. }
            | Self::Timeout { .. }
            | Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_) => ErrorKind::InternalError,
        }
    }
}

/// True when the store rejected a write because of a unique index.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Maps a unique-index violation on insert/update to a `Conflict` with the given
/// message and passes every other database error through.
pub fn conflict_on_unique(err: DbErr, message: impl Into<String>) -> Error {
    if is_unique_violation(&err) {
        Error::conflict(message)
    } else {
        Error::Database(err)
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
