//! Error types of the SQLite driver.

use ferrent_orm::DriverError;
use thiserror::Error;

/// Extended result codes of constraint violations.
pub mod codes {
    /// `SQLITE_CONSTRAINT_FOREIGNKEY`
    pub const FOREIGN_KEY: &str = "787";
    /// `SQLITE_CONSTRAINT_PRIMARYKEY`
    pub const PRIMARY_KEY: &str = "1555";
    /// `SQLITE_CONSTRAINT_UNIQUE`
    pub const UNIQUE: &str = "2067";
}

/// Invalid driver settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Wraps a sqlx error, keeping the extended result code of database errors.
pub(crate) fn driver_error(error: sqlx::Error) -> DriverError {
    let code = error
        .as_database_error()
        .and_then(|e| e.code())
        .map(std::borrow::Cow::into_owned);
    DriverError::with_source(code, error)
}
