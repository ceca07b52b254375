//! The [`Driver`] implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ferrent_core::{Query, SqlValue};
use ferrent_migrate::{Migrator, TableMigrate};
use ferrent_orm::{
    BadRequest, Connection, ConnectionStats, DatabaseConfig, Driver, DriverError, DriverResult,
    DriverTransaction, IsolationLevel, KeywordHandler, Row,
};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Row as _, Sqlite, Transaction};

use crate::config::SqliteConfig;
use crate::ddl;
use crate::error::{codes, driver_error};
use crate::render::{self, quote_identifier, quote_literal};
use crate::value::{decode_row, prepare};

/// A SQLite backend over a sqlx connection pool.
///
/// The pool is created by [`Driver::init`], which `Db::open` calls; every
/// schema namespace becomes an attached database on each connection.
///
/// ```ignore
/// use ferrent_orm::Db;
/// use ferrent_sqlite::{SqliteConfig, SqliteDriver};
///
/// let db: Db<Zoo> = Db::open(SqliteDriver::new(SqliteConfig::memory())).await?;
/// db.migrate().auto_migrate().await?;
/// ```
pub struct SqliteDriver {
    config: SqliteConfig,
    database: DatabaseConfig,
    pool: Mutex<Option<SqlitePool>>,
}

impl SqliteDriver {
    /// Creates a driver. Nothing connects until the database is opened.
    #[must_use]
    pub fn new(config: SqliteConfig) -> Self {
        let database = config.database_config();
        Self {
            config,
            database,
            pool: Mutex::new(None),
        }
    }

    /// Settings of the driver.
    #[must_use]
    pub const fn sqlite_config(&self) -> &SqliteConfig {
        &self.config
    }

    /// The connection pool, once initialized.
    #[must_use]
    pub fn pool(&self) -> Option<SqlitePool> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_pool(&self) -> DriverResult<SqlitePool> {
        self.pool()
            .ok_or_else(|| DriverError::new("SQLite driver is not initialized"))
    }

    /// `ATTACH` statements for the schema namespaces. In-memory databases
    /// attach private in-memory databases; file databases attach
    /// `<schema>.db` next to the main file.
    fn attach_statements(&self, options: &SqliteConnectOptions, schemas: &[String]) -> Vec<String> {
        let directory = options
            .get_filename()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        schemas
            .iter()
            .map(|schema| {
                let file = if self.config.is_memory() {
                    ":memory:".to_string()
                } else {
                    let stem = schema.trim_matches('"').replace("\"\"", "\"");
                    directory.join(format!("{stem}.db")).display().to_string()
                };
                format!("ATTACH DATABASE {} AS {schema}", quote_literal(&file))
            })
            .collect()
    }

    async fn execute_ddl(&self, sql: &str) -> DriverResult<()> {
        let pool = self.require_pool()?;
        tracing::info!(sql = %sql, "altering schema");
        sqlx::query(sql)
            .execute(&pool)
            .await
            .map_err(driver_error)?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("url", &self.config.url)
            .field("connected", &self.pool().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    fn config(&self) -> &DatabaseConfig {
        &self.database
    }

    fn keyword_handler(&self) -> KeywordHandler {
        Arc::new(quote_identifier)
    }

    fn translate_error(&self, error: DriverError) -> Result<BadRequest, DriverError> {
        match error.code.as_deref() {
            Some(codes::UNIQUE | codes::PRIMARY_KEY) => Ok(BadRequest::UniqueValue(error)),
            Some(codes::FOREIGN_KEY) => Ok(BadRequest::ForeignKey(error)),
            _ => Err(error),
        }
    }

    async fn init(&self, schemas: &[String]) -> DriverResult<()> {
        if self.pool().is_some() {
            tracing::debug!(url = %self.config.url, "SQLite pool already initialized");
            return Ok(());
        }
        let options = SqliteConnectOptions::from_str(&self.config.url)
            .map_err(driver_error)?
            .create_if_missing(true)
            .foreign_keys(self.config.foreign_keys);

        let mut statements = self.attach_statements(&options, schemas);
        statements.extend(self.config.init_statements.iter().cloned());
        let statements = Arc::new(statements);

        // every connection of an in-memory database is a separate database
        let max_connections = if self.config.is_memory() {
            1
        } else {
            self.config.max_connections
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .after_connect(move |conn, _meta| {
                let statements = Arc::clone(&statements);
                Box::pin(async move {
                    for sql in statements.iter() {
                        sqlx::query(sql).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(driver_error)?;

        tracing::info!(
            url = %self.config.url,
            max_connections,
            schemas = schemas.len(),
            "connected to SQLite"
        );
        *self.pool.lock().unwrap_or_else(PoisonError::into_inner) = Some(pool);
        Ok(())
    }

    async fn connection(&self) -> DriverResult<Box<dyn Connection>> {
        let pool = self.require_pool()?;
        let conn = pool.acquire().await.map_err(driver_error)?;
        Ok(Box::new(PooledConnection { conn }))
    }

    async fn begin(&self, isolation: IsolationLevel) -> DriverResult<Box<dyn DriverTransaction>> {
        let pool = self.require_pool()?;
        let mut tx = pool.begin().await.map_err(driver_error)?;
        // SQLite transactions are serializable; only read uncommitted
        // changes anything, and only for shared-cache connections. The
        // pragma sticks to the connection, so it is set on every begin.
        let read_uncommitted = i32::from(isolation == IsolationLevel::ReadUncommitted);
        sqlx::query(&format!("PRAGMA read_uncommitted = {read_uncommitted}"))
            .execute(&mut *tx)
            .await
            .map_err(driver_error)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn migrate(&self, migrator: &Migrator) -> DriverResult<()> {
        let pool = self.require_pool()?;
        let mut tx = pool.begin().await.map_err(driver_error)?;
        for table in migrator.ordered() {
            for sql in migration_statements(&mut *tx, table).await? {
                tracing::debug!(table = %table.key(), sql = %sql, "applying migration");
                sqlx::query(&sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(driver_error)?;
            }
        }
        tx.commit().await.map_err(driver_error)?;
        tracing::info!(tables = migrator.tables.len(), "applied migration plan");
        Ok(())
    }

    async fn drop_table(&self, schema: Option<&str>, table: &str) -> DriverResult<()> {
        self.execute_ddl(&ddl::drop_table_sql(schema, table)).await
    }

    async fn rename_table(
        &self,
        schema: Option<&str>,
        table: &str,
        new_name: &str,
    ) -> DriverResult<()> {
        self.execute_ddl(&ddl::rename_table_sql(schema, table, new_name))
            .await
    }

    async fn drop_column(&self, schema: Option<&str>, table: &str, column: &str) -> DriverResult<()> {
        self.execute_ddl(&ddl::drop_column_sql(schema, table, column))
            .await
    }

    async fn rename_column(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
        new_name: &str,
    ) -> DriverResult<()> {
        self.execute_ddl(&ddl::rename_column_sql(schema, table, column, new_name))
            .await
    }

    fn stats(&self) -> ConnectionStats {
        let max_open = if self.config.is_memory() {
            1
        } else {
            self.config.max_connections
        };
        self.pool().map_or(
            ConnectionStats {
                max_open,
                ..ConnectionStats::default()
            },
            |pool| {
                let open = pool.size();
                let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(open);
                ConnectionStats {
                    max_open,
                    open,
                    in_use: open - idle,
                    idle,
                }
            },
        )
    }

    async fn close(&self) -> DriverResult<()> {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::info!(url = %self.config.url, "closed SQLite pool");
        }
        Ok(())
    }
}

/// Statements bringing one table in line with its plan: a `CREATE TABLE`
/// for a missing table, `ADD COLUMN` for missing columns, then every index.
async fn migration_statements(
    conn: &mut SqliteConnection,
    table: &TableMigrate,
) -> DriverResult<Vec<String>> {
    let existing: Vec<String> = sqlx::query(&ddl::table_info_sql(table))
        .fetch_all(&mut *conn)
        .await
        .map_err(driver_error)?
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()
        .map_err(driver_error)?;

    let mut statements = Vec::new();
    if existing.is_empty() {
        statements.push(ddl::create_table_sql(table));
    } else {
        for attribute in table.columns() {
            if !existing.iter().any(|name| name == &attribute.name) {
                if !attribute.nullable && attribute.default.is_none() {
                    tracing::warn!(
                        table = %table.key(),
                        column = %attribute.name,
                        "adding NOT NULL column without default as nullable"
                    );
                }
                statements.push(ddl::add_column_sql(table, attribute));
            }
        }
    }
    statements.extend(
        table
            .indexes
            .iter()
            .map(|index| ddl::create_index_sql(table, index)),
    );
    Ok(statements)
}

async fn execute_on(conn: &mut SqliteConnection, query: &Query) -> DriverResult<u64> {
    let stmt = render::render(query)?;
    let result = prepare(&stmt.sql, &stmt.arguments)
        .execute(&mut *conn)
        .await
        .map_err(driver_error)?;
    Ok(result.rows_affected())
}

async fn fetch_on(conn: &mut SqliteConnection, query: &Query) -> DriverResult<Vec<Row>> {
    let stmt = render::render(query)?;
    let rows = prepare(&stmt.sql, &stmt.arguments)
        .fetch_all(&mut *conn)
        .await
        .map_err(driver_error)?;
    rows.iter().map(decode_row).collect()
}

async fn insert_on(
    conn: &mut SqliteConnection,
    query: &Query,
    statements: Vec<render::Statement>,
) -> DriverResult<Vec<SqlValue>> {
    let mut ids = Vec::new();
    for stmt in statements {
        let prepared = prepare(&stmt.sql, &stmt.arguments);
        if query.returning.is_some() {
            for row in prepared.fetch_all(&mut *conn).await.map_err(driver_error)? {
                let mut values = decode_row(&row)?;
                if values.is_empty() {
                    return Err(DriverError::new("RETURNING produced no column"));
                }
                ids.push(values.swap_remove(0));
            }
        } else {
            prepared.execute(&mut *conn).await.map_err(driver_error)?;
        }
    }
    Ok(ids)
}

/// A pooled connection outside any transaction.
struct PooledConnection {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl Connection for PooledConnection {
    async fn execute(&mut self, query: &Query) -> DriverResult<u64> {
        execute_on(&mut *self.conn, query).await
    }

    async fn fetch(&mut self, query: &Query) -> DriverResult<Vec<Row>> {
        fetch_on(&mut *self.conn, query).await
    }

    /// A batch split into several statements runs in its own transaction.
    async fn insert(&mut self, query: &Query) -> DriverResult<Vec<SqlValue>> {
        let statements = render::render_insert_rows(query)?;
        if statements.len() < 2 {
            return insert_on(&mut *self.conn, query, statements).await;
        }
        let mut tx = sqlx::Connection::begin(&mut *self.conn)
            .await
            .map_err(driver_error)?;
        let ids = insert_on(&mut *tx, query, statements).await?;
        tx.commit().await.map_err(driver_error)?;
        Ok(ids)
    }
}

/// An open transaction. Dropping it unfinished rolls it back.
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl Connection for SqliteTransaction {
    async fn execute(&mut self, query: &Query) -> DriverResult<u64> {
        execute_on(&mut *self.tx, query).await
    }

    async fn fetch(&mut self, query: &Query) -> DriverResult<Vec<Row>> {
        fetch_on(&mut *self.tx, query).await
    }

    async fn insert(&mut self, query: &Query) -> DriverResult<Vec<SqlValue>> {
        insert_on(&mut *self.tx, query, render::render_insert_rows(query)?).await
    }
}

#[async_trait]
impl DriverTransaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> DriverResult<()> {
        self.tx.commit().await.map_err(driver_error)
    }

    async fn rollback(self: Box<Self>) -> DriverResult<()> {
        self.tx.rollback().await.map_err(driver_error)
    }
}
