//! Migration synthesis.
//!
//! [`synthesize`] walks the same declarations as the introspector and asks
//! the same relation functions how each field maps, so a plan can never
//! disagree with the live catalog about which columns are keys or foreign
//! keys.

use ferrent_core::directive::IndexDirective;
use ferrent_core::error::{ConfigError, Result};
use ferrent_core::introspect::{field_role, is_auto_increment, FieldRole};
use ferrent_core::naming::column_name_pattern;
use ferrent_core::relation::{ParsedEntity, RelationClass};
use ferrent_core::{RelationKind, SchemaDecl, Siblings};

use crate::migrator::{
    AttributeMigrate, IndexMigrate, Migrator, PrimaryKeyMigrate, RelationMigrate, TableMigrate,
};
use crate::types::SqlType;

/// Builds the migration plan of a schema.
///
/// `keyword` escapes schema, table, column and index names for the target
/// dialect.
///
/// # Errors
///
/// Returns [`ConfigError`] for malformed directives, duplicate entities,
/// entities without a primary key and conflicting index declarations.
pub fn synthesize(decl: &SchemaDecl, keyword: &dyn Fn(&str) -> String) -> Result<Migrator> {
    let siblings = Siblings::new(decl)?;
    let mut migrator = Migrator {
        schemas: decl.namespaces.iter().map(|ns| keyword(ns)).collect(),
        ..Migrator::default()
    };
    for entity in siblings.entities() {
        let table = synthesize_table(&siblings, entity, keyword)?;
        tracing::trace!(
            table = %table.key(),
            columns = table.columns().len(),
            indexes = table.indexes.len(),
            "synthesized table"
        );
        migrator.tables.insert(table.key(), table);
    }
    tracing::debug!(tables = migrator.tables.len(), "synthesized migration plan");
    Ok(migrator)
}

#[allow(clippy::cast_possible_truncation)]
const fn position(index: usize) -> u32 {
    index as u32
}

fn attribute(
    entity: &ParsedEntity,
    index: usize,
    keyword: &dyn Fn(&str) -> String,
) -> AttributeMigrate {
    let field = &entity.shape.fields[index];
    let directives = &entity.directives[index];
    let name = column_name_pattern(field.ident);
    AttributeMigrate {
        position: position(index),
        field: field.ident.to_string(),
        escaping_name: keyword(&name),
        name,
        data_type: directives.type_override.as_ref().map_or_else(
            || SqlType::from_rust_type(field.value_type),
            |ty| SqlType::Custom(ty.clone()),
        ),
        nullable: field.is_nullable(),
        default: directives.default.clone(),
    }
}

fn synthesize_table(
    siblings: &Siblings,
    entity: &ParsedEntity,
    keyword: &dyn Fn(&str) -> String,
) -> Result<TableMigrate> {
    let shape = entity.shape;
    if entity.primary_keys.is_empty() {
        return Err(ConfigError::MissingPrimaryKey {
            entity: shape.type_name.to_string(),
        });
    }
    let name = shape.table();
    let mut table = TableMigrate {
        type_name: shape.type_name.to_string(),
        escaping_name: keyword(&name),
        schema: entity.namespace.map(str::to_string),
        escaping_schema: entity.namespace.map(keyword),
        primary_keys: entity
            .primary_keys
            .iter()
            .map(|&i| PrimaryKeyMigrate {
                attribute: attribute(entity, i, keyword),
                auto_increment: is_auto_increment(entity, i),
            })
            .collect(),
        attributes: Vec::new(),
        relations: Vec::new(),
        indexes: Vec::new(),
        name,
    };
    let mut indexes = IndexSet::new(&table.name, keyword);

    for index in 0..shape.fields.len() {
        let is_relation = match field_role(siblings, entity, index) {
            FieldRole::Skipped => continue,
            FieldRole::PrimaryKeyOnly => false,
            FieldRole::Attribute => {
                table.attributes.push(attribute(entity, index, keyword));
                false
            }
            FieldRole::Relation { class, foreign_key } => {
                let attribute = attribute(entity, index, keyword);
                let kind = match class {
                    RelationClass::ManyToSome => {
                        if !attribute.nullable {
                            if let Some(pk) = table
                                .primary_keys
                                .iter_mut()
                                .find(|pk| pk.attribute.position == attribute.position)
                            {
                                pk.auto_increment = false;
                            }
                        }
                        RelationKind::ManyToSome
                    }
                    RelationClass::OneToSome => RelationKind::OneToSome {
                        one_to_many: entity.directives[index].one_to_many,
                    },
                };
                let target = foreign_key.target;
                let target_table = target.shape.table();
                let target_column = column_name_pattern(foreign_key.target_ident());
                table.relations.push(RelationMigrate {
                    kind,
                    attribute,
                    target_schema: target.namespace.map(str::to_string),
                    escaping_target_schema: target.namespace.map(keyword),
                    escaping_target_table: keyword(&target_table),
                    target_table,
                    escaping_target_column: keyword(&target_column),
                    target_column,
                });
                true
            }
        };

        let column = column_name_pattern(shape.fields[index].ident);
        let directives = &entity.directives[index];
        if directives.unique && !is_relation {
            indexes.add(
                &IndexDirective {
                    name: None,
                    unique: true,
                    function: None,
                },
                &column,
            )?;
        }
        if directives.index {
            indexes.add(&IndexDirective::default(), &column)?;
        }
        for declared in &directives.indexes {
            indexes.add(declared, &column)?;
        }
    }

    table.indexes = indexes.finish();
    Ok(table)
}

/// Indexes of one table, merged by computed name.
struct IndexSet<'a> {
    table: &'a str,
    keyword: &'a dyn Fn(&str) -> String,
    indexes: Vec<IndexMigrate>,
}

impl<'a> IndexSet<'a> {
    fn new(table: &'a str, keyword: &'a dyn Fn(&str) -> String) -> Self {
        Self {
            table,
            keyword,
            indexes: Vec::new(),
        }
    }

    /// `<table>_<n>` when named, else `<table>_uidx_<column>` for unique
    /// indexes and `<table>_idx_<column>` otherwise.
    fn index_name(&self, declared: &IndexDirective, column: &str) -> String {
        match (&declared.name, declared.unique) {
            (Some(name), _) => format!("{}_{name}", self.table),
            (None, true) => format!("{}_uidx_{column}", self.table),
            (None, false) => format!("{}_idx_{column}", self.table),
        }
    }

    fn add(&mut self, declared: &IndexDirective, column: &str) -> Result<()> {
        let name = self.index_name(declared, column);
        let escaped_column = (self.keyword)(column);
        if let Some(existing) = self.indexes.iter_mut().find(|i| i.name == name) {
            if existing.unique != declared.unique || existing.function != declared.function {
                return Err(ConfigError::IndexConflict {
                    table: self.table.to_string(),
                    index: name,
                });
            }
            if !existing.columns.contains(&escaped_column) {
                existing.columns.push(escaped_column);
            }
            return Ok(());
        }
        self.indexes.push(IndexMigrate {
            escaping_name: (self.keyword)(&name),
            name,
            unique: declared.unique,
            function: declared.function.clone(),
            columns: vec![escaped_column],
        });
        Ok(())
    }

    fn finish(self) -> Vec<IndexMigrate> {
        self.indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(name: &str) -> String {
        format!("\"{name}\"")
    }

    #[test]
    fn test_index_names() {
        let set = IndexSet::new("animals", &quote);
        let named = IndexDirective {
            name: Some("by_name".to_string()),
            ..IndexDirective::default()
        };
        let unique = IndexDirective {
            unique: true,
            ..IndexDirective::default()
        };
        assert_eq!(set.index_name(&named, "name"), "animals_by_name");
        assert_eq!(set.index_name(&unique, "name"), "animals_uidx_name");
        assert_eq!(
            set.index_name(&IndexDirective::default(), "name"),
            "animals_idx_name"
        );
    }

    #[test]
    fn test_same_name_merges_columns() {
        let mut set = IndexSet::new("animals", &quote);
        let pair = IndexDirective {
            name: Some("pair".to_string()),
            unique: true,
            function: None,
        };
        set.add(&pair, "name").unwrap();
        set.add(&pair, "kind").unwrap();
        set.add(&pair, "kind").unwrap();
        let indexes = set.finish();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].columns, vec!["\"name\"", "\"kind\""]);
        assert_eq!(indexes[0].escaping_name, "\"animals_pair\"");
    }

    #[test]
    fn test_same_name_different_function_conflicts() {
        let mut set = IndexSet::new("animals", &quote);
        set.add(
            &IndexDirective {
                name: Some("pair".to_string()),
                unique: false,
                function: Some("lower".to_string()),
            },
            "name",
        )
        .unwrap();
        let err = set
            .add(
                &IndexDirective {
                    name: Some("pair".to_string()),
                    unique: false,
                    function: None,
                },
                "kind",
            )
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::IndexConflict {
                table: "animals".to_string(),
                index: "animals_pair".to_string(),
            }
        );
    }
}
