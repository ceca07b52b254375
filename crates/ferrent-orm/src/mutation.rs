//! Insert, update, save, delete and remove builders.

use ferrent_core::query::{Assignment, Column, TableRef};
use ferrent_core::{
    Col, CompareOp, Entity, EntityType, FieldId, IntoArgument, KeyTuple, Operation, Query,
    QueryKind, SqlValue, Table,
};

use crate::database::Shared;
use crate::error::{DriverError, ProgrammerError, Result};
use crate::exec::{impl_session_options, Session};
use crate::filter::Condition;

fn target(entity: &EntityType) -> TableRef {
    TableRef {
        schema: entity.schema.clone(),
        name: entity.table.clone(),
    }
}

fn field_value<E: Entity>(value: &E, field: u32) -> SqlValue {
    value.field_value(field as usize).unwrap_or(SqlValue::Null)
}

fn key_of<E: Entity>(entity: &EntityType, value: &E) -> KeyTuple {
    KeyTuple(
        entity
            .primary_keys
            .iter()
            .map(|pk| field_value(value, pk.attribute.field))
            .collect(),
    )
}

fn equals(column: Column, value: SqlValue) -> Operation {
    Operation::Compare {
        column,
        op: CompareOp::Eq,
        value,
    }
}

/// Equality predicates for every non-zero column field of `value`.
pub(crate) fn non_zero_predicates<E: Entity>(entity: &EntityType, value: &E) -> Vec<Operation> {
    entity
        .bindings
        .iter()
        .filter(|(field, _)| !value.field_is_zero(*field as usize))
        .map(|(field, descriptor)| {
            equals(Column::from_descriptor(descriptor), field_value(value, *field))
        })
        .collect()
}

/// Equality predicates for the primary key of `value`; empty when any key
/// field is zero.
pub(crate) fn key_predicates<E: Entity>(entity: &EntityType, value: &E) -> Vec<Operation> {
    let keys: Vec<Operation> = entity
        .bindings
        .iter()
        .filter(|(field, descriptor)| {
            descriptor.is_primary_key() && !value.field_is_zero(*field as usize)
        })
        .map(|(field, descriptor)| {
            equals(Column::from_descriptor(descriptor), field_value(value, *field))
        })
        .collect();
    if keys.len() == entity.primary_keys.len() {
        keys
    } else {
        Vec::new()
    }
}

/// Inserts one or many rows.
pub struct Insert<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
}

impl<'a, E: Entity> Insert<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
        }
    }

    /// Inserts `value` and writes the generated key back into it.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error; a duplicate key is
    /// [`BadRequest::UniqueValue`](crate::BadRequest::UniqueValue).
    pub async fn one(self, value: &mut E) -> Result<()> {
        self.all(std::slice::from_mut(value)).await
    }

    /// Inserts every value in one statement and writes the generated keys
    /// back in order.
    ///
    /// A field with a `default:` directive is left out when it is zero in
    /// every value.
    ///
    /// # Errors
    ///
    /// Returns [`ProgrammerError::EmptyBatch`] for an empty slice, before
    /// any statement runs, and [`Error::Driver`](crate::Error::Driver) when
    /// the driver returns a generated key count different from the row
    /// count.
    pub async fn all(self, values: &mut [E]) -> Result<()> {
        if values.is_empty() {
            return Err(ProgrammerError::EmptyBatch.into());
        }
        let entity = self.session.shared.entity::<E>(self.table.token())?;

        let mut query = Query::new(QueryKind::Insert, Some(target(entity)));
        let mut fields = Vec::new();
        let mut generated = None;
        for (field, descriptor) in &entity.bindings {
            if descriptor.is_auto_increment() {
                query.returning = Some(Column::from_descriptor(descriptor));
                generated = Some(*field as usize);
                continue;
            }
            if descriptor.has_default() && values.iter().all(|v| v.field_is_zero(*field as usize))
            {
                continue;
            }
            query.columns.push(Column::from_descriptor(descriptor));
            fields.push(*field);
        }
        query.rows = values
            .iter()
            .map(|value| fields.iter().map(|&f| field_value(value, f)).collect())
            .collect();

        let ids = self.session.insert(&query).await?;
        if let Some(index) = generated {
            if ids.len() != values.len() {
                return Err(DriverError::new(format!(
                    "insert returned {} generated keys for {} rows",
                    ids.len(),
                    values.len()
                ))
                .into());
            }
            for (value, id) in values.iter_mut().zip(ids) {
                value.set_field_value(index, id)?;
            }
        }
        for value in values.iter() {
            self.table.tracker().mark_existing(key_of(entity, value));
        }
        Ok(())
    }
}

/// Updates rows with explicit assignments.
pub struct Update<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
    sets: Vec<(FieldId, SqlValue)>,
}

impl<'a, E: Entity> Update<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
            sets: Vec::new(),
        }
    }

    /// Adds `column = value`.
    #[must_use]
    pub fn set<T, A: IntoArgument<T>>(mut self, column: Col<T>, value: A) -> Self {
        self.sets.push((column.id(), value.into_value()));
        self
    }

    /// Updates the rows matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgrammerError::EmptySet`] without any `set`, a
    /// programmer error for a column of another table, or the translated
    /// driver error.
    pub async fn matching(self, condition: Condition) -> Result<u64> {
        self.run(Some(condition)).await
    }

    /// Updates every row of the table.
    ///
    /// # Errors
    ///
    /// See [`Update::matching`].
    pub async fn all(self) -> Result<u64> {
        self.run(None).await
    }

    async fn run(self, condition: Option<Condition>) -> Result<u64> {
        if self.sets.is_empty() {
            return Err(ProgrammerError::EmptySet.into());
        }
        let shared = self.session.shared;
        let token = self.table.token();
        let entity = shared.entity::<E>(token)?;
        let mut query = Query::new(QueryKind::Update, Some(target(entity)));
        for (field, value) in self.sets {
            if field.table_token() != token {
                return Err(ProgrammerError::ForeignTable {
                    field,
                    entity: entity.type_name,
                }
                .into());
            }
            query.sets.push(Assignment {
                column: shared.column(field)?,
                value,
            });
        }
        query.filter = condition.map(|c| c.resolve(shared)).transpose()?;
        self.session.execute(&query).await
    }
}

/// Updates one row from a value: non-zero key fields select the row, the
/// other non-zero fields are assigned.
pub struct Save<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
}

impl<'a, E: Entity> Save<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
        }
    }

    /// Saves `value`. Nothing runs and `Ok(0)` is returned when the value
    /// has no non-zero key field or nothing to assign.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn one(self, value: &E) -> Result<u64> {
        let entity = self.session.shared.entity::<E>(self.table.token())?;
        let mut keys = Vec::new();
        let mut sets = Vec::new();
        for (field, descriptor) in &entity.bindings {
            if value.field_is_zero(*field as usize) {
                continue;
            }
            let column = Column::from_descriptor(descriptor);
            let current = field_value(value, *field);
            if descriptor.is_primary_key() {
                keys.push(equals(column, current));
            } else {
                sets.push(Assignment {
                    column,
                    value: current,
                });
            }
        }
        let Some(filter) = Operation::all(keys) else {
            tracing::debug!(entity = entity.type_name, "save skipped: key is zero");
            return Ok(0);
        };
        if sets.is_empty() {
            tracing::debug!(entity = entity.type_name, "save skipped: nothing to set");
            return Ok(0);
        }
        let mut query = Query::new(QueryKind::Update, Some(target(entity)));
        query.sets = sets;
        query.filter = Some(filter);
        self.session.execute(&query).await
    }
}

/// Deletes rows matching a condition.
pub struct Delete<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
}

impl<'a, E: Entity> Delete<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
        }
    }

    /// Deletes the rows matching `condition`.
    ///
    /// # Errors
    ///
    /// Returns a programmer error for foreign or unregistered tokens, or
    /// the translated driver error.
    pub async fn matching(self, condition: Condition) -> Result<u64> {
        self.run(Some(condition)).await
    }

    /// Deletes every row of the table.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn all(self) -> Result<u64> {
        let deleted = self.run(None).await?;
        self.table.tracker().clear();
        Ok(deleted)
    }

    async fn run(&self, condition: Option<Condition>) -> Result<u64> {
        let shared = self.session.shared;
        let entity = shared.entity::<E>(self.table.token())?;
        let mut query = Query::new(QueryKind::Delete, Some(target(entity)));
        query.filter = condition.map(|c| c.resolve(shared)).transpose()?;
        self.session.execute(&query).await
    }
}

/// Deletes rows matching the non-zero fields of a value.
pub struct Remove<'a, E: Entity> {
    session: Session<'a>,
    table: &'a Table<E>,
}

impl<'a, E: Entity> Remove<'a, E> {
    pub(crate) fn new(shared: &'a Shared, table: &'a Table<E>) -> Self {
        Self {
            session: Session::new(shared),
            table,
        }
    }

    /// Removes the rows equal to every non-zero field of `value`. A value
    /// with only zero fields removes nothing and runs no statement.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error; a row still referenced is
    /// [`BadRequest::ForeignKey`](crate::BadRequest::ForeignKey).
    pub async fn by_value(self, value: &E) -> Result<u64> {
        let entity = self.session.shared.entity::<E>(self.table.token())?;
        let Some(filter) = Operation::all(non_zero_predicates(entity, value)) else {
            tracing::debug!(entity = entity.type_name, "remove skipped: value is zero");
            return Ok(0);
        };
        let mut query = Query::new(QueryKind::Delete, Some(target(entity)));
        query.filter = Some(filter);
        let deleted = self.session.execute(&query).await?;
        if deleted > 0 && !key_predicates(entity, value).is_empty() {
            self.table.tracker().mark_deleted(key_of(entity, value));
        }
        Ok(deleted)
    }
}

impl_session_options!(
    [<'a, E: Entity>] Insert<'a, E>,
    [<'a, E: Entity>] Update<'a, E>,
    [<'a, E: Entity>] Save<'a, E>,
    [<'a, E: Entity>] Delete<'a, E>,
    [<'a, E: Entity>] Remove<'a, E>,
);
