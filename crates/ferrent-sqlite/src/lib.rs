//! # ferrent-sqlite
//!
//! A SQLite [`Driver`](ferrent_orm::Driver) for ferrent, built on sqlx.
//!
//! The driver renders the query model with `?` parameters, applies
//! migration plans additively (new tables, new columns, indexes) and maps
//! SQLite's constraint result codes to
//! [`BadRequest`](ferrent_orm::BadRequest).
//!
//! ## Example
//!
//! ```ignore
//! use ferrent_orm::{Db, Entity, Schema, Table};
//! use ferrent_sqlite::{SqliteConfig, SqliteDriver};
//!
//! #[derive(Debug, Default, Entity)]
//! pub struct Animal {
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! #[derive(Schema)]
//! pub struct Zoo {
//!     pub animal: Table<Animal>,
//! }
//!
//! let driver = SqliteDriver::new(SqliteConfig::from_env()?);
//! let db: Db<Zoo> = Db::open(driver).await?;
//! db.migrate().auto_migrate().await?;
//! ```
//!
//! ## Schemas
//!
//! Tables of a nested schema group live in an attached database named
//! after the group. In-memory databases attach in-memory databases; file
//! databases attach `<schema>.db` in the directory of the main file.

pub mod config;
mod ddl;
pub mod driver;
pub mod error;
pub mod render;
mod value;

pub use config::SqliteConfig;
pub use driver::SqliteDriver;
pub use error::ConfigError;
pub use render::{quote_identifier, render, Statement};
