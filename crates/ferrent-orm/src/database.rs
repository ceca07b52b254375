//! Database handles.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ferrent_core::query::{Column, TableRef};
use ferrent_core::{
    introspect, Catalog, Col, Descriptor, Entity, EntityType, FieldId, FieldRegistry, HandleId,
    Schema, SchemaDecl, Table, TableBinder, TableToken,
};

use crate::driver::{ConnectionStats, Driver, IsolationLevel};
use crate::error::{DriverError, Error, ProgrammerError, Result};
use crate::exec::Raw;
use crate::mutation::{Delete, Insert, Remove, Save, Update};
use crate::projection::{self, Aggregated, Applied, EntityRows, Projection};
use crate::select::{Find, Select};
use crate::transaction::Transaction;

/// State shared by a handle, its builders and its transactions.
pub(crate) struct Shared {
    pub(crate) handle: HandleId,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) catalog: Catalog,
    pub(crate) decl: SchemaDecl,
    registry: &'static FieldRegistry,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProgrammerError::ClosedHandle(self.handle).into());
        }
        Ok(())
    }

    /// Looks up the binding of a column token of this handle.
    pub(crate) fn descriptor(&self, id: FieldId) -> Result<Descriptor> {
        self.ensure_open()?;
        if id.handle != self.handle {
            return Err(ProgrammerError::ForeignHandle {
                field: id,
                field_handle: id.handle,
                handle: self.handle,
            }
            .into());
        }
        self.registry
            .get(id)
            .ok_or_else(|| ProgrammerError::UnregisteredField(id).into())
    }

    pub(crate) fn column(&self, id: FieldId) -> Result<Column> {
        self.descriptor(id).map(|d| Column::from_descriptor(&d))
    }

    /// Catalog entry of a bound table, checked against the entity type.
    pub(crate) fn entity<E: Entity>(&self, table: TableToken) -> Result<&EntityType> {
        self.ensure_open()?;
        let type_name = E::shape().type_name;
        if table.handle != self.handle {
            return Err(ProgrammerError::ForeignHandle {
                field: table.field(0),
                field_handle: table.handle,
                handle: self.handle,
            }
            .into());
        }
        self.catalog
            .entity(table.table)
            .filter(|entity| entity.type_name == type_name)
            .ok_or_else(|| ProgrammerError::UnknownEntity(type_name).into())
    }

    /// The table bound to a slot of this handle.
    pub(crate) fn table_ref(&self, table: TableToken) -> Result<TableRef> {
        self.ensure_open()?;
        if table.handle != self.handle {
            return Err(ProgrammerError::ForeignHandle {
                field: table.field(0),
                field_handle: table.handle,
                handle: self.handle,
            }
            .into());
        }
        self.catalog
            .entity(table.table)
            .map(|entity| TableRef {
                schema: entity.schema.clone(),
                name: entity.table.clone(),
            })
            .ok_or_else(|| ProgrammerError::UnregisteredField(table.field(0)).into())
    }

    pub(crate) fn translate(&self, error: DriverError) -> Error {
        let error = classify(&*self.driver, error);
        tracing::warn!(handle = %self.handle, error = %error, "statement failed");
        error
    }

    fn teardown(&self) {
        self.closed.store(true, Ordering::Release);
        self.catalog.unregister(self.registry, self.handle);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.registry.delete_handle(self.handle);
    }
}

/// An open database: the schema's tables plus the driver behind them.
///
/// `Db` dereferences to the schema root, so columns are reached as
/// `db.animal.name`.
///
/// # Example
///
/// ```ignore
/// use ferrent_orm::{filter::eq, Db};
///
/// let db: Db<Zoo> = Db::open(driver).await?;
/// let mut cat = Animal { name: "Cat".into(), ..Animal::default() };
/// db.insert(&db.animal).one(&mut cat).await?;
/// let found = db.select(&db.animal).filter(eq(db.animal.id, cat.id)).one().await?;
/// ```
pub struct Db<S: Schema> {
    shared: Arc<Shared>,
    schema: S,
}

impl<S: Schema> Db<S> {
    /// Opens a handle: maps the schema, initializes the driver and binds
    /// every column token.
    ///
    /// Nothing is registered when mapping or initialization fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the schema cannot be mapped and the
    /// translated driver error when initialization fails.
    pub async fn open(driver: impl Driver) -> Result<Self> {
        Self::open_shared(Arc::new(driver)).await
    }

    /// Like [`Db::open`] for a driver that is already shared.
    ///
    /// # Errors
    ///
    /// See [`Db::open`].
    pub async fn open_shared(driver: Arc<dyn Driver>) -> Result<Self> {
        let keyword = driver.keyword_handler();
        let decl = SchemaDecl::of::<S>();
        let catalog = introspect(&decl, &*keyword)?;
        if let Err(error) = driver.init(&catalog.schemas).await {
            return Err(classify(&*driver, error));
        }

        let handle = HandleId::next();
        let schema = S::bind(&mut TableBinder::new(handle));
        let registry = FieldRegistry::global();
        catalog.register(registry, handle);
        tracing::info!(
            handle = %handle,
            driver = driver.name(),
            tables = catalog.entities.len(),
            "opened database"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                handle,
                driver,
                catalog,
                decl,
                registry,
                closed: AtomicBool::new(false),
            }),
            schema,
        })
    }

    /// Closes the driver and forgets every column binding of the handle.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error. The bindings are removed
    /// regardless.
    pub async fn close(&self) -> Result<()> {
        self.shared.ensure_open()?;
        self.shared.teardown();
        tracing::info!(handle = %self.shared.handle, "closed database");
        self.shared
            .driver
            .close()
            .await
            .map_err(|e| self.shared.translate(e))
    }

    /// Identity of this handle.
    #[must_use]
    pub fn handle(&self) -> HandleId {
        self.shared.handle
    }

    /// Mapped metadata of the schema.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    /// Backend name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.shared.driver.name()
    }

    /// Pool statistics of the driver.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.shared.driver.stats()
    }

    /// Inserts rows into `table`.
    pub fn insert<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Insert<'a, E> {
        Insert::new(&self.shared, table)
    }

    /// Updates rows of `table` with explicit assignments.
    pub fn update<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Update<'a, E> {
        Update::new(&self.shared, table)
    }

    /// Updates one row from the non-zero fields of a value.
    pub fn save<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Save<'a, E> {
        Save::new(&self.shared, table)
    }

    /// Deletes rows of `table` matching a condition.
    pub fn delete<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Delete<'a, E> {
        Delete::new(&self.shared, table)
    }

    /// Deletes rows matching the non-zero fields of a value.
    pub fn remove<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Remove<'a, E> {
        Remove::new(&self.shared, table)
    }

    /// Selects whole rows of `table`.
    pub fn select<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Select<'a, EntityRows<E>> {
        Select::new(&self.shared, EntityRows::new(table.token()))
    }

    /// Selects a projection: a column, an aggregate, a function or a tuple
    /// of them.
    pub fn select_columns<P: Projection>(&self, projection: P) -> Select<'_, P> {
        Select::new(&self.shared, projection)
    }

    /// `SELECT COUNT(column)`.
    pub fn count<T>(&self, column: Col<T>) -> Select<'_, Aggregated<i64>> {
        self.select_columns(projection::count(column))
    }

    /// `SELECT SUM(column)`.
    pub fn sum<T>(&self, column: Col<T>) -> Select<'_, Aggregated<Option<f64>>> {
        self.select_columns(projection::sum(column))
    }

    /// `SELECT AVG(column)`.
    pub fn avg<T>(&self, column: Col<T>) -> Select<'_, Aggregated<Option<f64>>> {
        self.select_columns(projection::avg(column))
    }

    /// `SELECT MIN(column)`.
    pub fn min<T>(&self, column: Col<T>) -> Select<'_, Aggregated<Option<f64>>> {
        self.select_columns(projection::min(column))
    }

    /// `SELECT MAX(column)`.
    pub fn max<T>(&self, column: Col<T>) -> Select<'_, Aggregated<Option<f64>>> {
        self.select_columns(projection::max(column))
    }

    /// `SELECT UPPER(column)`.
    pub fn to_upper<T: ferrent_core::FieldValue>(&self, column: Col<T>) -> Select<'_, Applied<T>> {
        self.select_columns(projection::upper(column))
    }

    /// `SELECT LOWER(column)`.
    pub fn to_lower<T: ferrent_core::FieldValue>(&self, column: Col<T>) -> Select<'_, Applied<T>> {
        self.select_columns(projection::lower(column))
    }

    /// Looks a single row up by value.
    pub fn find<'a, E: Entity>(&'a self, table: &'a Table<E>) -> Find<'a, E> {
        Find::new(&self.shared, table)
    }

    /// Runs raw SQL.
    pub fn raw(&self, sql: impl Into<String>) -> Raw<'_> {
        Raw::new(&self.shared, sql.into())
    }

    /// Schema migration operations.
    #[must_use]
    pub fn migrate(&self) -> crate::migrate::Migrate<'_> {
        crate::migrate::Migrate::new(&self.shared)
    }

    /// Begins a transaction. It must be committed or rolled back
    /// explicitly.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn begin(&self, isolation: IsolationLevel) -> Result<Transaction> {
        Transaction::begin(Arc::clone(&self.shared), isolation).await
    }

    /// Runs `body` in a transaction. Commits when it returns `Ok`; rolls
    /// back when it returns `Err` or panics.
    ///
    /// # Errors
    ///
    /// Returns the body's error, [`Error::TransactionPanicked`], or the
    /// error of begin, commit or rollback.
    pub async fn transaction<T, F, Fut>(&self, isolation: IsolationLevel, body: F) -> Result<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let tx = self.begin(isolation).await?;
        tx.run(body).await
    }
}

impl<S: Schema> Deref for Db<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.schema
    }
}

impl<S: Schema> std::fmt::Debug for Db<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("handle", &self.shared.handle)
            .field("driver", &self.shared.driver.name())
            .finish_non_exhaustive()
    }
}

/// Routes a driver error through the driver's classifier.
pub(crate) fn classify(driver: &dyn Driver, error: DriverError) -> Error {
    driver
        .translate_error(error)
        .map_or_else(Error::Driver, Error::BadRequest)
}
