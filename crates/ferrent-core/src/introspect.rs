//! Schema introspection.
//!
//! [`introspect`] walks the declarations of a schema root once and produces
//! a [`Catalog`]: per entity the table name, primary keys, attributes,
//! relations and the [`Descriptor`] bound to every column field. Nothing is
//! registered until the whole catalog is built, so a configuration error
//! leaves the field registry untouched.

use crate::error::{ConfigError, Result};
use crate::field::{FieldId, HandleId};
use crate::naming::column_name_pattern;
use crate::query::{Aggregate, Function};
use crate::registry::FieldRegistry;
use crate::relation::{ParsedEntity, RelationClass, Siblings};
use crate::shape::{FieldKind, FieldShape, SchemaDecl};

/// Location of a column inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Table slot.
    pub table_id: u32,
    /// Escaped schema namespace.
    pub schema: Option<String>,
    /// Escaped table name.
    pub table: String,
    /// Escaped column name.
    pub column: String,
    /// Field index in the entity shape.
    pub field: u32,
}

/// What a field is bound to. Exactly one descriptor exists per column
/// field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A primary-key column.
    PrimaryKey {
        /// Column location.
        column: ColumnDescriptor,
        /// Whether the database generates the value.
        auto_increment: bool,
    },
    /// A plain column.
    Attribute {
        /// Column location.
        column: ColumnDescriptor,
        /// Whether the column has a `default:` directive.
        has_default: bool,
    },
    /// A foreign key on the single side of a relation.
    OneToSome {
        /// Column location.
        column: ColumnDescriptor,
        /// `o2m` was given.
        one_to_many: bool,
    },
    /// A foreign key on the many side, or of a join entity.
    ManyToSome {
        /// Column location.
        column: ColumnDescriptor,
        /// Whether the column has a `default:` directive.
        has_default: bool,
    },
    /// The result of an aggregate over a column.
    Aggregate {
        /// Column location.
        column: ColumnDescriptor,
        /// Aggregate function.
        aggregate: Aggregate,
    },
    /// The result of a scalar function over a column.
    Function {
        /// Column location.
        column: ColumnDescriptor,
        /// Scalar function.
        function: Function,
    },
}

impl Descriptor {
    /// Column location.
    #[must_use]
    pub const fn column(&self) -> &ColumnDescriptor {
        match self {
            Self::PrimaryKey { column, .. }
            | Self::Attribute { column, .. }
            | Self::OneToSome { column, .. }
            | Self::ManyToSome { column, .. }
            | Self::Aggregate { column, .. }
            | Self::Function { column, .. } => column,
        }
    }

    /// Whether the field is a primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        matches!(self, Self::PrimaryKey { .. })
    }

    /// Whether the database generates the value on insert.
    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        matches!(
            self,
            Self::PrimaryKey {
                auto_increment: true,
                ..
            }
        )
    }

    /// Whether a zero value should be left to the column default.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        matches!(
            self,
            Self::Attribute {
                has_default: true,
                ..
            } | Self::ManyToSome {
                has_default: true,
                ..
            }
        )
    }
}

/// A mapped column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Field index.
    pub field: u32,
    /// Logical field identifier.
    pub ident: &'static str,
    /// Escaped column name.
    pub column: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// `default:` expression.
    pub default: Option<String>,
    /// Rust value type.
    pub data_type: &'static str,
}

/// A primary-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    /// The column.
    pub attribute: Attribute,
    /// Whether the database generates the value.
    pub auto_increment: bool,
}

/// Kind of an inferred relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RelationKind {
    /// Single side; `one_to_many` comes from the `o2m` directive.
    OneToSome {
        /// `o2m` was given.
        one_to_many: bool,
    },
    /// Owning many side, or a join entity.
    ManyToSome,
}

/// A foreign-key column and what it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Relation kind.
    pub kind: RelationKind,
    /// The foreign-key column.
    pub attribute: Attribute,
    /// Escaped schema of the referenced table.
    pub target_schema: Option<String>,
    /// Escaped referenced table.
    pub target_table: String,
    /// Escaped referenced column.
    pub target_column: String,
}

/// Introspected metadata of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    /// Table slot.
    pub table_id: u32,
    /// Struct identifier.
    pub type_name: &'static str,
    /// Escaped schema namespace.
    pub schema: Option<String>,
    /// Escaped table name.
    pub table: String,
    /// Primary keys in field order.
    pub primary_keys: Vec<PrimaryKey>,
    /// Plain columns in field order.
    pub attributes: Vec<Attribute>,
    /// Foreign keys in field order.
    pub relations: Vec<Relation>,
    /// Descriptor of every column field, ordered by field index.
    pub bindings: Vec<(u32, Descriptor)>,
}

impl EntityType {
    /// Descriptor bound to field `index`.
    #[must_use]
    pub fn binding(&self, index: u32) -> Option<&Descriptor> {
        self.bindings
            .iter()
            .find(|(field, _)| *field == index)
            .map(|(_, descriptor)| descriptor)
    }
}

/// Introspection result of a schema root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Entities by table slot.
    pub entities: Vec<EntityType>,
    /// Escaped schema namespaces.
    pub schemas: Vec<String>,
}

impl Catalog {
    /// Entity bound to a table slot.
    #[must_use]
    pub fn entity(&self, table_id: u32) -> Option<&EntityType> {
        self.entities.get(table_id as usize)
    }

    /// Looks an entity up by type name.
    #[must_use]
    pub fn entity_by_name(&self, type_name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.type_name == type_name)
    }

    /// Inserts every binding of the catalog for `handle`.
    pub fn register(&self, registry: &FieldRegistry, handle: HandleId) {
        for entity in &self.entities {
            for (field, descriptor) in &entity.bindings {
                let id = FieldId {
                    handle,
                    table: entity.table_id,
                    field: *field,
                };
                registry.set(id, descriptor.clone());
            }
        }
    }

    /// Removes every binding of the catalog for `handle`.
    pub fn unregister(&self, registry: &FieldRegistry, handle: HandleId) {
        for entity in &self.entities {
            for (field, _) in &entity.bindings {
                registry.delete(FieldId {
                    handle,
                    table: entity.table_id,
                    field: *field,
                });
            }
        }
    }
}

/// Whether a primary key is generated by the database: the entity has a
/// single key, `not_incr` is absent and the key is an integer or carries a
/// `default:`.
#[must_use]
pub fn is_auto_increment(entity: &ParsedEntity, index: usize) -> bool {
    let directives = &entity.directives[index];
    // Composite keys are never generated, even when every part is an integer.
    entity.primary_keys.len() == 1
        && !directives.not_incr
        && (directives.default.is_some() || entity.shape.fields[index].is_integer())
}

/// How a column field is classified. Shared with the migration synthesizer.
#[derive(Debug, Clone, Copy)]
pub enum FieldRole<'a> {
    /// A primary key that is not also a foreign key.
    PrimaryKeyOnly,
    /// A plain column.
    Attribute,
    /// A foreign key.
    Relation {
        /// Direction.
        class: RelationClass,
        /// Referenced sibling and key.
        foreign_key: crate::relation::ForeignKey<'a>,
    },
    /// Not mapped to a column.
    Skipped,
}

/// Classifies field `index` of `entity`.
#[must_use]
pub fn field_role<'a>(siblings: &'a Siblings, entity: &ParsedEntity, index: usize) -> FieldRole<'a> {
    let field: &FieldShape = &entity.shape.fields[index];
    let is_pk = entity.is_primary_key(index);
    match field.kind {
        FieldKind::Collection { .. } => FieldRole::Skipped,
        FieldKind::Record if is_pk => FieldRole::PrimaryKeyOnly,
        FieldKind::Record => FieldRole::Attribute,
        FieldKind::Scalar | FieldKind::Bytes | FieldKind::Optional => {
            match siblings.foreign_key(field.ident) {
                Some(foreign_key) => FieldRole::Relation {
                    class: siblings.classify(entity.shape, &foreign_key),
                    foreign_key,
                },
                None if is_pk => FieldRole::PrimaryKeyOnly,
                None => FieldRole::Attribute,
            }
        }
    }
}

/// Introspects a schema root.
///
/// `keyword` escapes schema, table and column names for the target
/// dialect.
///
/// # Errors
///
/// Returns [`ConfigError`] for malformed directives, duplicate entities or
/// an entity without a primary key.
pub fn introspect(decl: &SchemaDecl, keyword: &dyn Fn(&str) -> String) -> Result<Catalog> {
    let siblings = Siblings::new(decl)?;
    let mut entities = Vec::with_capacity(siblings.entities().len());
    for (slot, entity) in siblings.entities().iter().enumerate() {
        let table_id = u32::try_from(slot).map_err(|_| ConfigError::InvalidShape {
            entity: entity.shape.type_name.to_string(),
            reason: "too many tables".to_string(),
        })?;
        entities.push(introspect_entity(&siblings, entity, table_id, keyword)?);
    }
    tracing::debug!(tables = entities.len(), "introspected schema");
    Ok(Catalog {
        entities,
        schemas: decl.namespaces.iter().map(|ns| keyword(ns)).collect(),
    })
}

fn attribute(
    entity: &ParsedEntity,
    index: usize,
    keyword: &dyn Fn(&str) -> String,
) -> Attribute {
    let field = &entity.shape.fields[index];
    Attribute {
        field: field_index(index),
        ident: field.ident,
        column: keyword(&column_name_pattern(field.ident)),
        nullable: field.is_nullable(),
        default: entity.directives[index].default.clone(),
        data_type: field.value_type,
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn field_index(index: usize) -> u32 {
    index as u32
}

fn introspect_entity(
    siblings: &Siblings,
    entity: &ParsedEntity,
    table_id: u32,
    keyword: &dyn Fn(&str) -> String,
) -> Result<EntityType> {
    let shape = entity.shape;
    if entity.primary_keys.is_empty() {
        return Err(ConfigError::MissingPrimaryKey {
            entity: shape.type_name.to_string(),
        });
    }
    let schema = entity.namespace.map(keyword);
    let table = keyword(&shape.table());
    let location = |index: usize| ColumnDescriptor {
        table_id,
        schema: schema.clone(),
        table: table.clone(),
        column: keyword(&column_name_pattern(shape.fields[index].ident)),
        field: field_index(index),
    };

    let mut primary_keys: Vec<PrimaryKey> = entity
        .primary_keys
        .iter()
        .map(|&i| PrimaryKey {
            attribute: attribute(entity, i, keyword),
            auto_increment: is_auto_increment(entity, i),
        })
        .collect();
    let mut attributes = Vec::new();
    let mut relations = Vec::new();
    let mut bindings = Vec::new();

    for index in 0..shape.fields.len() {
        let directives = &entity.directives[index];
        match field_role(siblings, entity, index) {
            FieldRole::Skipped | FieldRole::PrimaryKeyOnly => {}
            FieldRole::Attribute => {
                attributes.push(attribute(entity, index, keyword));
                bindings.push((
                    field_index(index),
                    Descriptor::Attribute {
                        column: location(index),
                        has_default: directives.default.is_some(),
                    },
                ));
            }
            FieldRole::Relation { class, foreign_key } => {
                let nullable = shape.fields[index].is_nullable();
                let kind = match class {
                    RelationClass::ManyToSome => {
                        if !nullable {
                            if let Some(pk) = primary_keys
                                .iter_mut()
                                .find(|pk| pk.attribute.field == field_index(index))
                            {
                                pk.auto_increment = false;
                            }
                        }
                        RelationKind::ManyToSome
                    }
                    RelationClass::OneToSome => RelationKind::OneToSome {
                        one_to_many: directives.one_to_many,
                    },
                };
                let target = foreign_key.target;
                relations.push(Relation {
                    kind,
                    attribute: attribute(entity, index, keyword),
                    target_schema: target.namespace.map(keyword),
                    target_table: keyword(&target.shape.table()),
                    target_column: keyword(&column_name_pattern(foreign_key.target_ident())),
                });
                if !entity.is_primary_key(index) {
                    let descriptor = match kind {
                        RelationKind::ManyToSome => Descriptor::ManyToSome {
                            column: location(index),
                            has_default: directives.default.is_some(),
                        },
                        RelationKind::OneToSome { one_to_many } => Descriptor::OneToSome {
                            column: location(index),
                            one_to_many,
                        },
                    };
                    bindings.push((field_index(index), descriptor));
                }
            }
        }
    }

    for pk in &primary_keys {
        let index = pk.attribute.field as usize;
        bindings.push((
            pk.attribute.field,
            Descriptor::PrimaryKey {
                column: location(index),
                auto_increment: pk.auto_increment,
            },
        ));
    }
    bindings.sort_by_key(|(field, _)| *field);

    Ok(EntityType {
        table_id,
        type_name: shape.type_name,
        schema,
        table,
        primary_keys,
        attributes,
        relations,
        bindings,
    })
}
