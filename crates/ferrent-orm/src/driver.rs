//! The contract between the ORM and a database backend.
//!
//! A [`Driver`] renders the [`Query`] model in its dialect, executes it and
//! applies migration plans. The ORM never produces SQL text itself except
//! through [`Query::raw`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferrent_core::{Query, SqlValue};
use ferrent_migrate::Migrator;

use crate::error::{BadRequest, DriverError};

/// Result type of driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// One fetched row, in the order of the query's columns.
pub type Row = Vec<SqlValue>;

/// Escapes an identifier for the driver's dialect.
pub type KeywordHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// The backend default.
    #[default]
    Default,
    /// Read uncommitted.
    ReadUncommitted,
    /// Read committed.
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable.
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "DEFAULT"),
            Self::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::RepeatableRead => write!(f, "REPEATABLE READ"),
            Self::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Configured maximum of open connections.
    pub max_open: u32,
    /// Open connections.
    pub open: u32,
    /// Connections in use.
    pub in_use: u32,
    /// Idle connections.
    pub idle: u32,
}

/// Driver-neutral settings a driver exposes to the ORM.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Log every executed statement at debug level.
    pub log_queries: bool,
    /// Statements slower than this are logged at warn level.
    pub slow_query_threshold: Option<Duration>,
    /// Statements run once by [`Driver::init`].
    pub init_statements: Vec<String>,
    /// Escaped schema namespaces registered by the handle.
    pub schemas: Vec<String>,
}

impl DatabaseConfig {
    /// Enables statement logging.
    #[must_use]
    pub const fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Sets the slow statement threshold.
    #[must_use]
    pub const fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Adds a statement run on initialization.
    #[must_use]
    pub fn init_statement(mut self, sql: impl Into<String>) -> Self {
        self.init_statements.push(sql.into());
        self
    }
}

/// A connection able to run statements.
#[async_trait]
pub trait Connection: Send {
    /// Runs a statement and returns the number of affected rows.
    async fn execute(&mut self, query: &Query) -> DriverResult<u64>;

    /// Runs a query and returns its rows.
    async fn fetch(&mut self, query: &Query) -> DriverResult<Vec<Row>>;

    /// Runs an insert. When the query has a returning column, the generated
    /// value of every inserted row is returned in row order; otherwise the
    /// result is empty.
    async fn insert(&mut self, query: &Query) -> DriverResult<Vec<SqlValue>>;
}

/// An open backend transaction.
#[async_trait]
pub trait DriverTransaction: Connection {
    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> DriverResult<()>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> DriverResult<()>;
}

/// A database backend.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Backend name, e.g. `"SQLite"`.
    fn name(&self) -> &'static str;

    /// Settings of this driver.
    fn config(&self) -> &DatabaseConfig;

    /// Escapes schema, table, column and index names.
    fn keyword_handler(&self) -> KeywordHandler;

    /// Classifies a failure as a constraint violation. Failures that are not
    /// constraint violations are handed back unchanged.
    fn translate_error(&self, error: DriverError) -> std::result::Result<BadRequest, DriverError>;

    /// Connects and runs the initialization statements. `schemas` are the
    /// escaped namespaces of the schema being opened.
    async fn init(&self, schemas: &[String]) -> DriverResult<()>;

    /// Hands out a connection.
    async fn connection(&self) -> DriverResult<Box<dyn Connection>>;

    /// Begins a transaction.
    async fn begin(&self, isolation: IsolationLevel) -> DriverResult<Box<dyn DriverTransaction>>;

    /// Creates or alters tables so they match the plan.
    async fn migrate(&self, migrator: &Migrator) -> DriverResult<()>;

    /// Drops a table. Names are escaped.
    async fn drop_table(&self, schema: Option<&str>, table: &str) -> DriverResult<()>;

    /// Renames a table. Names are escaped.
    async fn rename_table(&self, schema: Option<&str>, table: &str, new_name: &str)
        -> DriverResult<()>;

    /// Drops a column. Names are escaped.
    async fn drop_column(&self, schema: Option<&str>, table: &str, column: &str)
        -> DriverResult<()>;

    /// Renames a column. Names are escaped.
    async fn rename_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        new_name: &str,
    ) -> DriverResult<()>;

    /// Pool statistics.
    fn stats(&self) -> ConnectionStats;

    /// Closes every connection.
    async fn close(&self) -> DriverResult<()>;
}
