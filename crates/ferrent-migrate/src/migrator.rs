//! Declarative table descriptions handed to a driver.

use std::collections::{BTreeMap, HashSet};

use ferrent_core::RelationKind;
use serde::{Deserialize, Serialize};

use crate::types::SqlType;

/// A column of a migrated table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMigrate {
    /// Field index in the entity shape.
    pub position: u32,
    /// Field identifier.
    pub field: String,
    /// Column name.
    pub name: String,
    /// Column name escaped for the target dialect.
    pub escaping_name: String,
    /// Column type.
    pub data_type: SqlType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Server-side default expression.
    pub default: Option<String>,
}

/// A primary-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyMigrate {
    /// The key column.
    pub attribute: AttributeMigrate,
    /// Whether the database generates the value.
    pub auto_increment: bool,
}

/// A foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMigrate {
    /// Relation kind.
    pub kind: RelationKind,
    /// The foreign-key column.
    pub attribute: AttributeMigrate,
    /// Namespace of the referenced table.
    pub target_schema: Option<String>,
    /// Escaped namespace of the referenced table.
    pub escaping_target_schema: Option<String>,
    /// Referenced table.
    pub target_table: String,
    /// Escaped referenced table.
    pub escaping_target_table: String,
    /// Referenced column.
    pub target_column: String,
    /// Escaped referenced column.
    pub escaping_target_column: String,
}

impl RelationMigrate {
    /// Key of the referenced table in [`Migrator::tables`].
    #[must_use]
    pub fn target_key(&self) -> String {
        qualified(self.target_schema.as_deref(), &self.target_table)
    }
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMigrate {
    /// Index name.
    pub name: String,
    /// Escaped index name.
    pub escaping_name: String,
    /// Whether the index is unique.
    pub unique: bool,
    /// Function applied to every column, lowercased.
    pub function: Option<String>,
    /// Escaped columns in declaration order.
    pub columns: Vec<String>,
}

/// Description of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMigrate {
    /// Struct identifier of the entity.
    pub type_name: String,
    /// Table name.
    pub name: String,
    /// Escaped table name.
    pub escaping_name: String,
    /// Namespace.
    pub schema: Option<String>,
    /// Escaped namespace.
    pub escaping_schema: Option<String>,
    /// Primary keys in field order.
    pub primary_keys: Vec<PrimaryKeyMigrate>,
    /// Plain columns in field order.
    pub attributes: Vec<AttributeMigrate>,
    /// Foreign keys in field order.
    pub relations: Vec<RelationMigrate>,
    /// Indexes in declaration order.
    pub indexes: Vec<IndexMigrate>,
}

impl TableMigrate {
    /// Key of this table in [`Migrator::tables`].
    #[must_use]
    pub fn key(&self) -> String {
        qualified(self.schema.as_deref(), &self.name)
    }

    /// Every column of the table once, in field order. A key that is also
    /// a foreign key appears a single time.
    #[must_use]
    pub fn columns(&self) -> Vec<&AttributeMigrate> {
        let mut seen = HashSet::new();
        let mut columns: Vec<&AttributeMigrate> = self
            .primary_keys
            .iter()
            .map(|pk| &pk.attribute)
            .chain(self.attributes.iter())
            .chain(self.relations.iter().map(|r| &r.attribute))
            .filter(|a| seen.insert(a.position))
            .collect();
        columns.sort_by_key(|a| a.position);
        columns
    }

    /// The primary key bound to field `position`, if any.
    #[must_use]
    pub fn primary_key(&self, position: u32) -> Option<&PrimaryKeyMigrate> {
        self.primary_keys
            .iter()
            .find(|pk| pk.attribute.position == position)
    }

    /// The relation held by field `position`, if any.
    #[must_use]
    pub fn relation(&self, position: u32) -> Option<&RelationMigrate> {
        self.relations
            .iter()
            .find(|r| r.attribute.position == position)
    }
}

/// A synthesized migration plan: every table of a schema keyed by its
/// qualified name (`namespace.table` or `table`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migrator {
    /// Tables by key.
    pub tables: BTreeMap<String, TableMigrate>,
    /// Escaped namespaces to create before the tables.
    pub schemas: Vec<String>,
}

impl Migrator {
    /// Looks a table up by key.
    #[must_use]
    pub fn table(&self, key: &str) -> Option<&TableMigrate> {
        self.tables.get(key)
    }

    /// Tables ordered so that referenced tables come before the tables
    /// referencing them. Cycles and self references keep key order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&TableMigrate> {
        let mut done: HashSet<String> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.tables.len());
        while ordered.len() < self.tables.len() {
            let ready: Vec<&TableMigrate> = self
                .tables
                .values()
                .filter(|t| !done.contains(&t.key()))
                .filter(|t| {
                    t.relations.iter().all(|r| {
                        let target = r.target_key();
                        target == t.key()
                            || done.contains(&target)
                            || !self.tables.contains_key(&target)
                    })
                })
                .collect();
            let batch = if ready.is_empty() {
                // cycle: take the first remaining table
                self.tables
                    .values()
                    .filter(|t| !done.contains(&t.key()))
                    .take(1)
                    .collect()
            } else {
                ready
            };
            for table in batch {
                done.insert(table.key());
                ordered.push(table);
            }
        }
        ordered
    }

    /// Serializes the plan as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{table}"),
        None => table.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(position: u32, name: &str) -> AttributeMigrate {
        AttributeMigrate {
            position,
            field: name.to_string(),
            name: name.to_string(),
            escaping_name: format!("\"{name}\""),
            data_type: SqlType::BigInt,
            nullable: false,
            default: None,
        }
    }

    fn table(name: &str, references: &[&str]) -> TableMigrate {
        TableMigrate {
            type_name: name.to_string(),
            name: name.to_string(),
            escaping_name: format!("\"{name}\""),
            schema: None,
            escaping_schema: None,
            primary_keys: vec![PrimaryKeyMigrate {
                attribute: column(0, "id"),
                auto_increment: true,
            }],
            attributes: Vec::new(),
            relations: references
                .iter()
                .enumerate()
                .map(|(i, target)| RelationMigrate {
                    kind: RelationKind::ManyToSome,
                    attribute: column(u32::try_from(i).unwrap() + 1, &format!("{target}_id")),
                    target_schema: None,
                    escaping_target_schema: None,
                    target_table: (*target).to_string(),
                    escaping_target_table: format!("\"{target}\""),
                    target_column: "id".to_string(),
                    escaping_target_column: "\"id\"".to_string(),
                })
                .collect(),
            indexes: Vec::new(),
        }
    }

    fn migrator(tables: Vec<TableMigrate>) -> Migrator {
        Migrator {
            tables: tables.into_iter().map(|t| (t.key(), t)).collect(),
            schemas: Vec::new(),
        }
    }

    #[test]
    fn test_ordered_puts_targets_first() {
        let m = migrator(vec![
            table("a_items", &["z_owners"]),
            table("z_owners", &[]),
            table("b_links", &["a_items", "z_owners"]),
        ]);
        let names: Vec<_> = m.ordered().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["z_owners", "a_items", "b_links"]);
    }

    #[test]
    fn test_ordered_survives_cycles() {
        let m = migrator(vec![
            table("a", &["b"]),
            table("b", &["a"]),
            table("c", &["c"]),
        ]);
        let names: Vec<_> = m.ordered().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_columns_are_unique_and_ordered() {
        let mut t = table("links", &["a"]);
        t.primary_keys.push(PrimaryKeyMigrate {
            attribute: column(1, "a_id"),
            auto_increment: false,
        });
        t.attributes.push(column(2, "note"));
        let names: Vec<_> = t.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "a_id", "note"]);
    }

    #[test]
    fn test_qualified_key() {
        let mut t = table("users", &[]);
        t.schema = Some("auth".to_string());
        assert_eq!(t.key(), "auth.users");
    }

    #[test]
    fn test_json_round_trip() {
        let m = migrator(vec![table("a", &[])]);
        let json = m.to_json().unwrap();
        let back: Migrator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
