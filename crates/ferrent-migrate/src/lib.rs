//! # ferrent-migrate
//!
//! Declarative migration plans for ferrent schemas.
//!
//! [`synthesize`] turns a schema declaration into a [`Migrator`]: one
//! [`TableMigrate`] per entity with typed columns, primary keys, foreign
//! keys and indexes. Diffing against a live database and emitting DDL are
//! left to the driver.
//!
//! ## Example
//!
//! ```ignore
//! use ferrent_core::SchemaDecl;
//! use ferrent_migrate::synthesize;
//!
//! let plan = synthesize(&SchemaDecl::of::<Zoo>(), &|name| format!("\"{name}\""))?;
//! for table in plan.ordered() {
//!     println!("{} ({} columns)", table.escaping_name, table.columns().len());
//! }
//! ```
//!
//! ## Indexes
//!
//! | Directive           | Index name                 |
//! |---------------------|----------------------------|
//! | `unique`            | `<table>_uidx_<column>`    |
//! | `index`             | `<table>_idx_<column>`     |
//! | `index(n:<name>)`   | `<table>_<name>`           |
//!
//! Declarations that produce the same name are merged when they agree on
//! uniqueness and function, and rejected otherwise.

pub mod migrator;
pub mod synthesize;
pub mod types;

pub use migrator::{
    AttributeMigrate, IndexMigrate, Migrator, PrimaryKeyMigrate, RelationMigrate, TableMigrate,
};
pub use synthesize::synthesize;
pub use types::SqlType;
