//! Error types for the ORM.

use ferrent_core::{ConfigError, FieldId, HandleId, ValueError};
use thiserror::Error;

/// A failure reported by a driver, before classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Backend error code, when the backend has one.
    pub code: Option<String>,
    /// Backend message.
    pub message: String,
    /// Underlying error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DriverError {
    /// Creates an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a backend error, keeping its code.
    pub fn with_source(
        code: Option<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// A constraint violation caused by user input.
#[derive(Debug, Error)]
pub enum BadRequest {
    /// A unique or primary-key constraint was violated.
    #[error("unique value violation: {0}")]
    UniqueValue(#[source] DriverError),

    /// A foreign-key constraint was violated.
    #[error("foreign key violation: {0}")]
    ForeignKey(#[source] DriverError),
}

/// Misuse of the API. These indicate a bug in the calling code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgrammerError {
    /// The column token has no binding; it was not obtained from an open
    /// handle or its handle was closed.
    #[error("field {0} is not registered; use a column of an open database handle")]
    UnregisteredField(FieldId),

    /// The column token belongs to another database handle.
    #[error("field {field} belongs to handle {field_handle}, not {handle}")]
    ForeignHandle {
        /// The offending token.
        field: FieldId,
        /// Handle of the token.
        field_handle: HandleId,
        /// Handle the statement runs on.
        handle: HandleId,
    },

    /// A batch insert received no rows.
    #[error("cannot insert an empty batch")]
    EmptyBatch,

    /// An update has nothing to set.
    #[error("update has no assignments")]
    EmptySet,

    /// The handle was closed.
    #[error("database handle {0} is closed")]
    ClosedHandle(HandleId),

    /// The transaction was already committed or rolled back.
    #[error("transaction is already finished")]
    TransactionFinished,

    /// The entity is not part of the handle's schema.
    #[error("entity '{0}' is not declared by this schema")]
    UnknownEntity(&'static str),

    /// A column of another table was used where only columns of the
    /// statement's table are allowed.
    #[error("field {field} does not belong to table '{entity}'")]
    ForeignTable {
        /// The offending token.
        field: FieldId,
        /// Entity the statement targets.
        entity: &'static str,
    },

    /// A select has nothing to project.
    #[error("select has no columns")]
    EmptyProjection,
}

/// Errors returned by ORM operations.
#[derive(Debug, Error)]
pub enum Error {
    /// User input violated a constraint.
    #[error(transparent)]
    BadRequest(#[from] BadRequest),

    /// A single-row lookup matched nothing.
    #[error("ferrent: no row matched")]
    NotFound,

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The schema could not be mapped.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The API was misused.
    #[error("programmer error: {0}")]
    Programmer(#[from] ProgrammerError),

    /// The driver failed and the failure is not a constraint violation.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// A fetched value did not fit its field.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// User code panicked inside a transaction; the transaction was rolled
    /// back.
    #[error("transaction body panicked: {0}")]
    TransactionPanicked(String),
}

impl Error {
    /// Whether the error is a unique-value violation.
    #[must_use]
    pub const fn is_unique_value(&self) -> bool {
        matches!(self, Self::BadRequest(BadRequest::UniqueValue(_)))
    }

    /// Whether the error is a foreign-key violation.
    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self, Self::BadRequest(BadRequest::ForeignKey(_)))
    }

    /// Whether the error was caused by user input.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }

    /// Whether a single-row lookup matched nothing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether the error is a misuse of the API rather than a runtime
    /// failure.
    #[must_use]
    pub const fn is_programmer(&self) -> bool {
        matches!(self, Self::Programmer(_))
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, Error>;
