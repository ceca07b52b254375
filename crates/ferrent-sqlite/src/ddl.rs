//! DDL for migration plans.
//!
//! SQLite only alters tables by adding, renaming or dropping columns, so a
//! plan is applied as `CREATE TABLE IF NOT EXISTS` for new tables,
//! `ADD COLUMN` for columns missing from existing ones, and
//! `CREATE INDEX IF NOT EXISTS` for every index. Type or key changes on
//! existing columns are not applied.

use ferrent_migrate::{AttributeMigrate, IndexMigrate, TableMigrate};

/// `schema.table` or `table`, from escaped parts.
pub(crate) fn qualified(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{name}"),
        None => name.to_string(),
    }
}

fn qualified_table(table: &TableMigrate) -> String {
    qualified(table.escaping_schema.as_deref(), &table.escaping_name)
}

/// The single auto-increment key SQLite can express inline.
fn inline_key(table: &TableMigrate) -> Option<&AttributeMigrate> {
    match table.primary_keys.as_slice() {
        [pk] if pk.auto_increment && pk.attribute.data_type.is_integer() => Some(&pk.attribute),
        _ => None,
    }
}

fn column_definition(attribute: &AttributeMigrate, inline_pk: bool) -> String {
    if inline_pk {
        return format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", attribute.escaping_name);
    }
    let mut sql = format!(
        "{} {}",
        attribute.escaping_name,
        attribute.data_type.sqlite_name()
    );
    if !attribute.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &attribute.default {
        sql.push_str(" DEFAULT (");
        sql.push_str(default);
        sql.push(')');
    }
    sql
}

/// `CREATE TABLE IF NOT EXISTS` with keys and same-schema foreign keys.
/// SQLite cannot reference a table of another attached database, so
/// cross-schema relations get no constraint.
pub(crate) fn create_table_sql(table: &TableMigrate) -> String {
    let inline = inline_key(table).map(|a| a.position);
    let mut parts: Vec<String> = table
        .columns()
        .into_iter()
        .map(|a| column_definition(a, Some(a.position) == inline))
        .collect();

    if inline.is_none() && !table.primary_keys.is_empty() {
        let keys: Vec<&str> = table
            .primary_keys
            .iter()
            .map(|pk| pk.attribute.escaping_name.as_str())
            .collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    for relation in &table.relations {
        if relation.target_schema != table.schema {
            continue;
        }
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            relation.attribute.escaping_name,
            relation.escaping_target_table,
            relation.escaping_target_column
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(table),
        parts.join(",\n  ")
    )
}

/// `ALTER TABLE .. ADD COLUMN`. SQLite rejects `NOT NULL` without a
/// default on added columns, so such columns are added as nullable.
pub(crate) fn add_column_sql(table: &TableMigrate, attribute: &AttributeMigrate) -> String {
    let mut definition = column_definition(attribute, false);
    if attribute.default.is_none() {
        definition = definition.replacen(" NOT NULL", "", 1);
    }
    format!(
        "ALTER TABLE {} ADD COLUMN {definition}",
        qualified_table(table)
    )
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS`. The schema qualifies the index
/// name, never the table.
pub(crate) fn create_index_sql(table: &TableMigrate, index: &IndexMigrate) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| match &index.function {
            Some(function) => format!("{}({c})", function.to_uppercase()),
            None => c.clone(),
        })
        .collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        qualified(table.escaping_schema.as_deref(), &index.escaping_name),
        table.escaping_name,
        columns.join(", ")
    )
}

/// `PRAGMA table_info` for an existing table.
pub(crate) fn table_info_sql(table: &TableMigrate) -> String {
    match &table.escaping_schema {
        Some(schema) => format!("PRAGMA {schema}.table_info({})", table.escaping_name),
        None => format!("PRAGMA table_info({})", table.escaping_name),
    }
}

pub(crate) fn drop_table_sql(schema: Option<&str>, table: &str) -> String {
    format!("DROP TABLE {}", qualified(schema, table))
}

pub(crate) fn rename_table_sql(schema: Option<&str>, table: &str, new_name: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {new_name}",
        qualified(schema, table)
    )
}

pub(crate) fn drop_column_sql(schema: Option<&str>, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {column}",
        qualified(schema, table)
    )
}

pub(crate) fn rename_column_sql(
    schema: Option<&str>,
    table: &str,
    column: &str,
    new_name: &str,
) -> String {
    format!(
        "ALTER TABLE {} RENAME COLUMN {column} TO {new_name}",
        qualified(schema, table)
    )
}

#[cfg(test)]
mod tests {
    use ferrent_core::RelationKind;
    use ferrent_migrate::{PrimaryKeyMigrate, RelationMigrate, SqlType};

    use super::*;

    fn attribute(position: u32, name: &str, data_type: SqlType) -> AttributeMigrate {
        AttributeMigrate {
            position,
            field: name.to_string(),
            name: name.to_string(),
            escaping_name: format!("\"{name}\""),
            data_type,
            nullable: false,
            default: None,
        }
    }

    fn animals() -> TableMigrate {
        TableMigrate {
            type_name: "Animal".to_string(),
            name: "animals".to_string(),
            escaping_name: "\"animals\"".to_string(),
            schema: None,
            escaping_schema: None,
            primary_keys: vec![PrimaryKeyMigrate {
                attribute: attribute(0, "id", SqlType::BigInt),
                auto_increment: true,
            }],
            attributes: vec![
                attribute(1, "name", SqlType::Text),
                AttributeMigrate {
                    default: Some("'wild'".to_string()),
                    ..attribute(2, "origin", SqlType::Text)
                },
            ],
            relations: vec![RelationMigrate {
                kind: RelationKind::ManyToSome,
                attribute: AttributeMigrate {
                    nullable: true,
                    ..attribute(3, "habitat_id", SqlType::BigInt)
                },
                target_schema: None,
                escaping_target_schema: None,
                target_table: "habitats".to_string(),
                escaping_target_table: "\"habitats\"".to_string(),
                target_column: "id".to_string(),
                escaping_target_column: "\"id\"".to_string(),
            }],
            indexes: vec![IndexMigrate {
                name: "animals_idx_name".to_string(),
                escaping_name: "\"animals_idx_name\"".to_string(),
                unique: false,
                function: None,
                columns: vec!["\"name\"".to_string()],
            }],
        }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    #[test]
    fn test_create_table_with_inline_key() {
        assert_eq!(
            create_table_sql(&animals()),
            "CREATE TABLE IF NOT EXISTS \"animals\" (\n  \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
             \"name\" TEXT NOT NULL,\n  \
             \"origin\" TEXT NOT NULL DEFAULT ('wild'),\n  \
             \"habitat_id\" INTEGER,\n  \
             FOREIGN KEY (\"habitat_id\") REFERENCES \"habitats\" (\"id\")\n)"
        );
    }

    #[test]
    fn test_composite_key_uses_table_constraint() {
        let mut table = animals();
        table.primary_keys = vec![
            PrimaryKeyMigrate {
                attribute: attribute(0, "id", SqlType::BigInt),
                auto_increment: false,
            },
            PrimaryKeyMigrate {
                attribute: attribute(1, "name", SqlType::Text),
                auto_increment: false,
            },
        ];
        table.attributes.remove(0);
        let sql = create_table_sql(&table);
        assert!(sql.contains("\"id\" INTEGER NOT NULL,"));
        assert!(sql.contains("PRIMARY KEY (\"id\", \"name\")"));
        assert!(!sql.contains("AUTOINCREMENT"));
    }

    #[test]
    fn test_cross_schema_relation_has_no_constraint() {
        let mut table = animals();
        table.relations[0].target_schema = Some("zoo".to_string());
        assert!(!create_table_sql(&table).contains("FOREIGN KEY"));
    }

    #[test]
    fn test_add_column_relaxes_not_null() {
        let table = animals();
        assert_eq!(
            add_column_sql(&table, &table.attributes[0]),
            "ALTER TABLE \"animals\" ADD COLUMN \"name\" TEXT"
        );
        assert_eq!(
            add_column_sql(&table, &table.attributes[1]),
            "ALTER TABLE \"animals\" ADD COLUMN \"origin\" TEXT NOT NULL DEFAULT ('wild')"
        );
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    #[test]
    fn test_create_index() {
        let table = animals();
        assert_eq!(
            create_index_sql(&table, &table.indexes[0]),
            "CREATE INDEX IF NOT EXISTS \"animals_idx_name\" ON \"animals\" (\"name\")"
        );
    }

    #[test]
    fn test_unique_function_index_in_schema() {
        let mut table = animals();
        table.escaping_schema = Some("\"zoo\"".to_string());
        let index = IndexMigrate {
            name: "animals_uidx_name".to_string(),
            escaping_name: "\"animals_uidx_name\"".to_string(),
            unique: true,
            function: Some("lower".to_string()),
            columns: vec!["\"name\"".to_string()],
        };
        assert_eq!(
            create_index_sql(&table, &index),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"zoo\".\"animals_uidx_name\" \
             ON \"animals\" (LOWER(\"name\"))"
        );
        assert_eq!(
            table_info_sql(&table),
            "PRAGMA \"zoo\".table_info(\"animals\")"
        );
    }

    #[test]
    fn test_alter_statements() {
        assert_eq!(
            rename_table_sql(Some("\"zoo\""), "\"animals\"", "\"beasts\""),
            "ALTER TABLE \"zoo\".\"animals\" RENAME TO \"beasts\""
        );
        assert_eq!(
            rename_column_sql(None, "\"animals\"", "\"name\"", "\"title\""),
            "ALTER TABLE \"animals\" RENAME COLUMN \"name\" TO \"title\""
        );
        assert_eq!(
            drop_column_sql(None, "\"animals\"", "\"name\""),
            "ALTER TABLE \"animals\" DROP COLUMN \"name\""
        );
        assert_eq!(drop_table_sql(None, "\"animals\""), "DROP TABLE \"animals\"");
    }
}
