//! Migration operations of a handle.

use ferrent_core::naming::{column_name_pattern, table_name_pattern, to_pascal_case, to_snake_case};
use ferrent_migrate::{synthesize, Migrator};

use crate::database::Shared;
use crate::error::Result;

/// Entry point of `db.migrate()`.
pub struct Migrate<'a> {
    shared: &'a Shared,
}

impl<'a> Migrate<'a> {
    pub(crate) const fn new(shared: &'a Shared) -> Self {
        Self { shared }
    }

    /// Synthesizes the plan of the handle's schema and hands it to the
    /// driver, which creates or alters tables to match. Returns the plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when the plan cannot
    /// be built, or the translated driver error.
    pub async fn auto_migrate(&self) -> Result<Migrator> {
        self.shared.ensure_open()?;
        let keyword = self.shared.driver.keyword_handler();
        let migrator = synthesize(&self.shared.decl, &*keyword)?;
        tracing::info!(
            handle = %self.shared.handle,
            tables = migrator.tables.len(),
            schemas = migrator.schemas.len(),
            "running auto migration"
        );
        self.shared
            .driver
            .migrate(&migrator)
            .await
            .map_err(|e| self.shared.translate(e))?;
        Ok(migrator)
    }

    /// Operations inside schema namespace `schema` (snake-cased). An empty
    /// name means the default namespace.
    #[must_use]
    pub fn on_schema(&self, schema: &str) -> MigrateSchema<'a> {
        let keyword = self.shared.driver.keyword_handler();
        MigrateSchema {
            shared: self.shared,
            schema: (!schema.is_empty()).then(|| keyword(&to_snake_case(schema))),
        }
    }

    /// Operations on a table of the default namespace.
    #[must_use]
    pub fn on_table(&self, table: &str) -> MigrateTable<'a> {
        MigrateSchema {
            shared: self.shared,
            schema: None,
        }
        .on_table(table)
    }
}

/// Operations scoped to a schema namespace.
pub struct MigrateSchema<'a> {
    shared: &'a Shared,
    schema: Option<String>,
}

impl<'a> MigrateSchema<'a> {
    /// Operations on the table of entity `table`; the name goes through the
    /// table naming rule (`Animal` and `animal` both become `animals`).
    #[must_use]
    pub fn on_table(self, table: &str) -> MigrateTable<'a> {
        let keyword = self.shared.driver.keyword_handler();
        MigrateTable {
            shared: self.shared,
            schema: self.schema,
            table: keyword(&table_name_pattern(table)),
        }
    }
}

/// Operations on one table.
pub struct MigrateTable<'a> {
    shared: &'a Shared,
    schema: Option<String>,
    table: String,
}

impl MigrateTable<'_> {
    fn column(&self, name: &str) -> String {
        let keyword = self.shared.driver.keyword_handler();
        keyword(&column_name_pattern(&to_pascal_case(name)))
    }

    /// Drops the table.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn drop_table(self) -> Result<()> {
        self.shared.ensure_open()?;
        tracing::info!(table = %self.table, "dropping table");
        self.shared
            .driver
            .drop_table(self.schema.as_deref(), &self.table)
            .await
            .map_err(|e| self.shared.translate(e))
    }

    /// Renames the table; `new_name` goes through the table naming rule.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn rename_table(self, new_name: &str) -> Result<()> {
        self.shared.ensure_open()?;
        let keyword = self.shared.driver.keyword_handler();
        let new_name = keyword(&table_name_pattern(new_name));
        tracing::info!(table = %self.table, new_name = %new_name, "renaming table");
        self.shared
            .driver
            .rename_table(self.schema.as_deref(), &self.table, &new_name)
            .await
            .map_err(|e| self.shared.translate(e))
    }

    /// Drops a column; `column` may be the Rust field name or the column
    /// name.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn drop_column(self, column: &str) -> Result<()> {
        self.shared.ensure_open()?;
        let column = self.column(column);
        tracing::info!(table = %self.table, column = %column, "dropping column");
        self.shared
            .driver
            .drop_column(self.schema.as_deref(), &self.table, &column)
            .await
            .map_err(|e| self.shared.translate(e))
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn rename_column(self, column: &str, new_name: &str) -> Result<()> {
        self.shared.ensure_open()?;
        let column = self.column(column);
        let new_name = self.column(new_name);
        tracing::info!(table = %self.table, column = %column, new_name = %new_name, "renaming column");
        self.shared
            .driver
            .rename_column(self.schema.as_deref(), &self.table, &column, &new_name)
            .await
            .map_err(|e| self.shared.translate(e))
    }
}
