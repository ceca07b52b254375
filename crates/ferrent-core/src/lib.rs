//! # ferrent-core
//!
//! Schema metadata for the ferrent ORM. Entity types describe themselves
//! through static shapes generated by `#[derive(Entity)]`; this crate turns
//! those shapes into tables, keys and relations, keeps the registry that
//! maps typed column tokens to columns, and defines the query model that
//! drivers render.
//!
//! ## Example
//!
//! ```ignore
//! use ferrent_core::{SchemaDecl, Table};
//! use ferrent_derive::{Entity, Schema};
//!
//! #[derive(Debug, Default, Entity)]
//! pub struct Habitat {
//!     pub id: i64,
//!     pub name: String,
//!     pub animals: Vec<Animal>,
//! }
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
//!     pub habitat: Table<Habitat>,
//!     pub animal: Table<Animal>,
//! }
//!
//! let catalog = ferrent_core::introspect(&SchemaDecl::of::<Zoo>(), &|n| format!("\"{n}\""))?;
//! ```

pub mod directive;
pub mod error;
pub mod field;
pub mod introspect;
pub mod naming;
pub mod query;
pub mod registry;
pub mod relation;
pub mod shape;
pub mod table;
pub mod value;

pub use directive::{Directives, IndexDirective};
pub use error::{ConfigError, ValueError};
pub use field::{Col, FieldId, HandleId, TableToken};
pub use introspect::{
    introspect, Attribute, Catalog, ColumnDescriptor, Descriptor, EntityType, PrimaryKey,
    Relation, RelationKind,
};
pub use query::{Aggregate, CompareOp, Function, JoinKind, Operation, Query, QueryKind};
pub use registry::FieldRegistry;
pub use relation::{RelationClass, Siblings};
pub use shape::{
    Entity, EntityDecl, EntityShape, FieldKind, FieldShape, RowValues, Schema, SchemaDecl,
    SchemaMember,
};
pub use table::{KeyTuple, RowTracker, Table, TableBinder};
pub use value::{FieldValue, IntoArgument, SqlValue};
