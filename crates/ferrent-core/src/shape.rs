//! Static shape metadata emitted by `#[derive(Entity)]` and
//! `#[derive(Schema)]`.
//!
//! Shapes are the compile-time substitute for runtime reflection: they list
//! every field of an entity with its logical identifier, type text, kind and
//! raw directives. The introspector, the relation inferencer and the
//! migration synthesizer all work from these shapes alone.

use crate::error::ValueError;
use crate::field::TableToken;
use crate::table::TableBinder;
use crate::value::{FieldValue, SqlValue};

/// How a field participates in the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A primitive, `String` or `char`. May be a foreign key.
    Scalar,
    /// `Vec<u8>`. A single column that may still be a foreign key.
    Bytes,
    /// `Option<T>`. A nullable column that may be a foreign key.
    Optional,
    /// Any other named value type (dates, newtypes). Always a plain column.
    Record,
    /// `Vec<E>` of another entity. No column; marks the "many" side of a
    /// relation.
    Collection {
        /// Type name of the collected entity.
        of: &'static str,
    },
}

/// One field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldShape {
    /// Logical identifier in `UpperCamelCase` (`habitat_id` is `HabitatId`).
    pub ident: &'static str,
    /// Rust type as written, without whitespace.
    pub rust_type: &'static str,
    /// Rust type with one `Option<..>` layer removed.
    pub value_type: &'static str,
    /// Mapping kind.
    pub kind: FieldKind,
    /// Raw directive string.
    pub directives: &'static str,
}

const INTEGER_TYPES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
];

impl FieldShape {
    /// Whether the field maps to a column.
    #[must_use]
    pub const fn is_column(&self) -> bool {
        !matches!(self.kind, FieldKind::Collection { .. })
    }

    /// Whether the field is nullable.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        matches!(self.kind, FieldKind::Optional)
    }

    /// Whether the value type is a Rust integer.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        INTEGER_TYPES.contains(&self.value_type)
    }
}

/// Shape of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityShape {
    /// Struct identifier.
    pub type_name: &'static str,
    /// Table name override from `#[orm(table = "...")]`.
    pub table_name: Option<&'static str>,
    /// Fields in declaration order.
    pub fields: &'static [FieldShape],
}

impl EntityShape {
    /// Whether the entity holds a `Vec` of the named entity.
    #[must_use]
    pub fn has_collection_of(&self, type_name: &str) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.kind, FieldKind::Collection { of } if of == type_name))
    }

    /// Table name before keyword escaping.
    #[must_use]
    pub fn table(&self) -> String {
        self.table_name
            .map_or_else(|| crate::naming::table_name_pattern(self.type_name), str::to_string)
    }
}

/// Values of one fetched row, placed by field index.
///
/// Fields a projection did not fetch are absent and read back as their
/// type's default.
#[derive(Debug, Default)]
pub struct RowValues {
    values: Vec<Option<SqlValue>>,
}

impl RowValues {
    /// Creates an empty row for an entity with `len` fields.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    /// Stores the value of field `index`.
    pub fn insert(&mut self, index: usize, value: SqlValue) {
        if index >= self.values.len() {
            self.values.resize(index + 1, None);
        }
        self.values[index] = Some(value);
    }

    /// Takes the value of field `index` and converts it.
    ///
    /// # Errors
    ///
    /// Returns the conversion error of the field type.
    pub fn take<T: FieldValue>(&mut self, index: usize) -> Result<T, ValueError> {
        match self.values.get_mut(index).and_then(Option::take) {
            Some(value) => T::from_value(value),
            None => Ok(T::default()),
        }
    }
}

/// A record type mapped to a table. Implemented by `#[derive(Entity)]`.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Typed column tokens of the entity, reachable through its `Table`.
    type Columns: Send + Sync;

    /// Static shape of the entity.
    fn shape() -> &'static EntityShape;

    /// Binds the column tokens to a table slot of a database handle.
    fn columns(table: TableToken) -> Self::Columns;

    /// Value of field `index`, or `None` for collections.
    fn field_value(&self, index: usize) -> Option<SqlValue>;

    /// Whether field `index` holds its zero value. Collections count as zero.
    fn field_is_zero(&self, index: usize) -> bool;

    /// Overwrites field `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when the value does not convert or `index` is
    /// not a column field.
    fn set_field_value(&mut self, index: usize, value: SqlValue) -> Result<(), ValueError>;

    /// Builds an entity from fetched values. Collections start empty.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when a value does not convert.
    fn from_row(row: &mut RowValues) -> Result<Self, ValueError>;
}

/// Declaration of one entity inside a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDecl {
    /// Entity shape.
    pub shape: &'static EntityShape,
    /// Schema namespace the entity lives in.
    pub namespace: Option<&'static str>,
}

/// Ordered entity declarations of a database root type.
///
/// The position of an entity in [`SchemaDecl::entities`] is its table slot,
/// which is the slot the matching [`Table`](crate::Table) binds to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDecl {
    /// Entities in declaration order.
    pub entities: Vec<EntityDecl>,
    /// Schema namespaces in declaration order.
    pub namespaces: Vec<&'static str>,
}

impl SchemaDecl {
    /// Collects the declarations of a schema root.
    #[must_use]
    pub fn of<S: Schema>() -> Self {
        let mut decl = Self::default();
        S::declare(&mut decl, None);
        decl
    }

    /// Appends an entity.
    pub fn push_entity(&mut self, shape: &'static EntityShape, namespace: Option<&'static str>) {
        self.entities.push(EntityDecl { shape, namespace });
    }

    /// Registers a namespace once.
    pub fn push_namespace(&mut self, namespace: &'static str) {
        if !self.namespaces.contains(&namespace) {
            self.namespaces.push(namespace);
        }
    }
}

/// A database root or schema group. Implemented by `#[derive(Schema)]`.
pub trait Schema: Sized + Send + Sync + 'static {
    /// Appends the entities of this group to `decl`.
    fn declare(decl: &mut SchemaDecl, namespace: Option<&'static str>);

    /// Builds the group, binding each table to the next slot.
    fn bind(binder: &mut TableBinder) -> Self;
}

/// A single member of a schema group (a `Table<E>`).
pub trait SchemaMember: Sized {
    /// Appends the member's entity to `decl`.
    fn declare(decl: &mut SchemaDecl, namespace: Option<&'static str>);

    /// Binds the member to the next table slot.
    fn bind(binder: &mut TableBinder) -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    static FIELDS: &[FieldShape] = &[
        FieldShape {
            ident: "Id",
            rust_type: "i64",
            value_type: "i64",
            kind: FieldKind::Scalar,
            directives: "",
        },
        FieldShape {
            ident: "Animals",
            rust_type: "Vec<Animal>",
            value_type: "Vec<Animal>",
            kind: FieldKind::Collection { of: "Animal" },
            directives: "",
        },
    ];

    static HABITAT: EntityShape = EntityShape {
        type_name: "Habitat",
        table_name: None,
        fields: FIELDS,
    };

    #[test]
    fn test_collection_lookup() {
        assert!(HABITAT.has_collection_of("Animal"));
        assert!(!HABITAT.has_collection_of("Food"));
        assert!(!HABITAT.fields[1].is_column());
        assert!(HABITAT.fields[0].is_integer());
    }

    #[test]
    fn test_table_name() {
        assert_eq!(HABITAT.table(), "habitats");
        let renamed = EntityShape {
            table_name: Some("zoo_habitat"),
            ..HABITAT
        };
        assert_eq!(renamed.table(), "zoo_habitat");
    }

    #[test]
    fn test_row_values_default_missing() {
        let mut row = RowValues::new(3);
        row.insert(0, SqlValue::Int(4));
        assert_eq!(row.take::<i64>(0).unwrap(), 4);
        assert_eq!(row.take::<String>(1).unwrap(), "");
        assert_eq!(row.take::<i64>(0).unwrap(), 0);
    }
}
