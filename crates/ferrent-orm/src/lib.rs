//! # ferrent-orm
//!
//! Typed statement builders over a [`Driver`].
//!
//! A database root is a struct of `Table<E>` fields deriving [`Schema`];
//! each entity derives [`Entity`]. Opening a [`Db`] maps the schema once,
//! binds every column token and then dereferences to the root, so statements
//! name columns as `db.animal.name` instead of strings.
//!
//! ## Example
//!
//! ```ignore
//! use ferrent_orm::filter::{eq, like};
//! use ferrent_orm::{Db, Entity, IsolationLevel, Schema, Table};
//!
//! #[derive(Debug, Default, Entity)]
//! pub struct Animal {
//!     pub id: i64,
//!     #[orm("index")]
//!     pub name: String,
//!     pub habitat_id: Option<i64>,
//! }
//!
//! #[derive(Schema)]
//! pub struct Zoo {
//!     pub animal: Table<Animal>,
//! }
//!
//! let db: Db<Zoo> = Db::open(driver).await?;
//! db.migrate().auto_migrate().await?;
//!
//! let mut cat = Animal { name: "Cat".into(), ..Animal::default() };
//! db.insert(&db.animal).one(&mut cat).await?;
//! assert!(cat.id > 0);
//!
//! db.update(&db.animal)
//!     .set(db.animal.name, "Lion")
//!     .matching(eq(db.animal.id, cat.id))
//!     .await?;
//!
//! let lions = db
//!     .select(&db.animal)
//!     .filter(like(db.animal.name, "L%"))
//!     .order_by_asc(db.animal.id)
//!     .all()
//!     .await?;
//!
//! db.transaction(IsolationLevel::Default, |tx| async move {
//!     db.remove(&db.animal).on_transaction(&tx).by_value(&cat).await?;
//!     Ok(())
//! })
//! .await?;
//! ```
//!
//! ## Statements
//!
//! | Builder                   | Terminals                                   |
//! |---------------------------|---------------------------------------------|
//! | `insert(&table)`          | `one`, `all`                                |
//! | `update(&table).set(..)`  | `matching`, `all`                           |
//! | `save(&table)`            | `one`                                       |
//! | `delete(&table)`          | `matching`, `all`                           |
//! | `remove(&table)`          | `by_value`                                  |
//! | `select(&table)`          | `all`, `one`, `optional`, `count`, `pagination` |
//! | `select_columns(..)`      | same as `select`                            |
//! | `find(&table)`            | `by_value`, `by_key`                        |
//! | `raw(sql)`                | `execute`, `fetch`                          |
//!
//! Every builder accepts `on_transaction(&tx)` and `with_cancel(token)`.

pub mod database;
pub mod driver;
pub mod error;
pub mod exec;
pub mod filter;
pub mod migrate;
pub mod mutation;
pub mod projection;
pub mod select;
pub mod transaction;

pub use database::Db;
pub use driver::{
    Connection, ConnectionStats, DatabaseConfig, Driver, DriverResult, DriverTransaction,
    IsolationLevel, KeywordHandler, Row,
};
pub use error::{BadRequest, DriverError, Error, ProgrammerError, Result};
pub use exec::Raw;
pub use ferrent_core::{Col, FieldValue, HandleId, Query, SqlValue, Table};
pub use ferrent_derive::{Entity, Schema};
pub use ferrent_migrate::Migrator;
pub use filter::Condition;
pub use migrate::{Migrate, MigrateSchema, MigrateTable};
pub use mutation::{Delete, Insert, Remove, Save, Update};
pub use projection::{Aggregated, Applied, EntityRows, Operand, Projection, Selector};
pub use select::{Find, Pagination, Select};
pub use tokio_util::sync::CancellationToken;
pub use transaction::Transaction;
