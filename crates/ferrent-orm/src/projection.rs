//! Projections: what a select fetches and how rows decode.
//!
//! A projection is a column token, an aggregate or function over one, a
//! whole entity, or a tuple of those:
//!
//! ```ignore
//! use ferrent_orm::projection::{count, upper};
//!
//! let names: Vec<(i64, String)> = db
//!     .select_columns((db.animal.id, upper(db.animal.name)))
//!     .all()
//!     .await?;
//! let total: i64 = db.select_columns(count(db.animal.id)).one().await?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::vec::IntoIter;

use ferrent_core::query::Column;
use ferrent_core::{
    Aggregate, Col, Descriptor, Entity, FieldId, FieldValue, Function, RowValues, SqlValue,
    TableToken, ValueError,
};

use crate::database::Shared;
use crate::error::Result;

/// An expression over one field: the field itself, an aggregate or a
/// scalar function of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The column.
    Field(FieldId),
    /// An aggregate over the column.
    Aggregate(FieldId, Aggregate),
    /// A scalar function of the column.
    Function(FieldId, Function),
}

impl Selector {
    /// Field the expression reads.
    #[must_use]
    pub const fn field(self) -> FieldId {
        match self {
            Self::Field(id) | Self::Aggregate(id, _) | Self::Function(id, _) => id,
        }
    }

    pub(crate) fn resolve(self, shared: &Shared) -> Result<Column> {
        let descriptor = shared.descriptor(self.field())?;
        let descriptor = match self {
            Self::Field(_) => descriptor,
            Self::Aggregate(_, aggregate) => Descriptor::Aggregate {
                column: descriptor.column().clone(),
                aggregate,
            },
            Self::Function(_, function) => Descriptor::Function {
                column: descriptor.column().clone(),
                function,
            },
        };
        Ok(Column::from_descriptor(&descriptor))
    }
}

/// An expression of type `T` usable in predicates and ordering.
pub trait Operand<T> {
    /// The expression.
    fn selector(&self) -> Selector;
}

impl<T> Operand<T> for Col<T> {
    fn selector(&self) -> Selector {
        Selector::Field(self.id())
    }
}

/// An aggregate over a column, decoding to `T`.
pub struct Aggregated<T> {
    field: FieldId,
    aggregate: Aggregate,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Aggregated<T> {
    const fn new(field: FieldId, aggregate: Aggregate) -> Self {
        Self {
            field,
            aggregate,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Aggregated<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Aggregated<T> {}

impl<T> fmt::Debug for Aggregated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregated")
            .field("field", &self.field)
            .field("aggregate", &self.aggregate)
            .finish()
    }
}

/// A scalar function of a column of type `T`.
pub struct Applied<T> {
    field: FieldId,
    function: Function,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Applied<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Applied<T> {}

impl<T> fmt::Debug for Applied<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applied")
            .field("field", &self.field)
            .field("function", &self.function)
            .finish()
    }
}

impl<T> Operand<T> for Applied<T> {
    fn selector(&self) -> Selector {
        Selector::Function(self.field, self.function)
    }
}

/// `COUNT(column)`.
#[must_use]
pub const fn count<T>(column: Col<T>) -> Aggregated<i64> {
    Aggregated::new(column.id(), Aggregate::Count)
}

/// `SUM(column)`; `None` over no rows.
#[must_use]
pub const fn sum<T>(column: Col<T>) -> Aggregated<Option<f64>> {
    Aggregated::new(column.id(), Aggregate::Sum)
}

/// `AVG(column)`; `None` over no rows.
#[must_use]
pub const fn avg<T>(column: Col<T>) -> Aggregated<Option<f64>> {
    Aggregated::new(column.id(), Aggregate::Avg)
}

/// `MIN(column)`; `None` over no rows.
#[must_use]
pub const fn min<T>(column: Col<T>) -> Aggregated<Option<f64>> {
    Aggregated::new(column.id(), Aggregate::Min)
}

/// `MAX(column)`; `None` over no rows.
#[must_use]
pub const fn max<T>(column: Col<T>) -> Aggregated<Option<f64>> {
    Aggregated::new(column.id(), Aggregate::Max)
}

/// `UPPER(column)`.
#[must_use]
pub const fn upper<T>(column: Col<T>) -> Applied<T> {
    Applied {
        field: column.id(),
        function: Function::Upper,
        _marker: PhantomData,
    }
}

/// `LOWER(column)`.
#[must_use]
pub const fn lower<T>(column: Col<T>) -> Applied<T> {
    Applied {
        field: column.id(),
        function: Function::Lower,
        _marker: PhantomData,
    }
}

/// Something a select can fetch.
pub trait Projection: Send + Sync {
    /// Decoded value of one row.
    type Output: Send;

    /// Appends the projected expressions in row order.
    fn selectors(&self, out: &mut Vec<Selector>);

    /// Decodes the values of one row, consuming as many as
    /// [`Projection::selectors`] appended.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when a value does not convert.
    fn decode(&self, values: &mut IntoIter<SqlValue>)
        -> std::result::Result<Self::Output, ValueError>;
}

fn next_value(values: &mut IntoIter<SqlValue>) -> SqlValue {
    values.next().unwrap_or(SqlValue::Null)
}

impl<T: FieldValue> Projection for Col<T> {
    type Output = T;

    fn selectors(&self, out: &mut Vec<Selector>) {
        out.push(Selector::Field(self.id()));
    }

    fn decode(&self, values: &mut IntoIter<SqlValue>) -> std::result::Result<T, ValueError> {
        T::from_value(next_value(values))
    }
}

impl<T: FieldValue> Projection for Aggregated<T> {
    type Output = T;

    fn selectors(&self, out: &mut Vec<Selector>) {
        out.push(Selector::Aggregate(self.field, self.aggregate));
    }

    fn decode(&self, values: &mut IntoIter<SqlValue>) -> std::result::Result<T, ValueError> {
        T::from_value(next_value(values))
    }
}

impl<T: FieldValue> Projection for Applied<T> {
    type Output = T;

    fn selectors(&self, out: &mut Vec<Selector>) {
        out.push(Selector::Function(self.field, self.function));
    }

    fn decode(&self, values: &mut IntoIter<SqlValue>) -> std::result::Result<T, ValueError> {
        T::from_value(next_value(values))
    }
}

/// Every column of an entity, decoding to the entity.
pub struct EntityRows<E> {
    table: TableToken,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityRows<E> {
    pub(crate) const fn new(table: TableToken) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }

    fn column_fields() -> impl Iterator<Item = usize> {
        E::shape()
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_column())
            .map(|(index, _)| index)
    }
}

impl<E: Entity> Projection for EntityRows<E> {
    type Output = E;

    fn selectors(&self, out: &mut Vec<Selector>) {
        for index in Self::column_fields() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            out.push(Selector::Field(self.table.field(index)));
        }
    }

    fn decode(&self, values: &mut IntoIter<SqlValue>) -> std::result::Result<E, ValueError> {
        let mut row = RowValues::new(E::shape().fields.len());
        for index in Self::column_fields() {
            row.insert(index, next_value(values));
        }
        E::from_row(&mut row)
    }
}

macro_rules! impl_projection_tuple {
    ($($idx:tt: $p:ident),+) => {
        impl<$($p: Projection),+> Projection for ($($p,)+) {
            type Output = ($($p::Output,)+);

            fn selectors(&self, out: &mut Vec<Selector>) {
                $(self.$idx.selectors(out);)+
            }

            fn decode(
                &self,
                values: &mut IntoIter<SqlValue>,
            ) -> std::result::Result<Self::Output, ValueError> {
                Ok(($(self.$idx.decode(values)?,)+))
            }
        }
    };
}

impl_projection_tuple!(0: P0);
impl_projection_tuple!(0: P0, 1: P1);
impl_projection_tuple!(0: P0, 1: P1, 2: P2);
impl_projection_tuple!(0: P0, 1: P1, 2: P2, 3: P3);
impl_projection_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4);
impl_projection_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5);
impl_projection_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5, 6: P6);
impl_projection_tuple!(0: P0, 1: P1, 2: P2, 3: P3, 4: P4, 5: P5, 6: P6, 7: P7);

#[cfg(test)]
mod tests {
    use super::*;
    use ferrent_core::HandleId;

    fn token() -> TableToken {
        TableToken {
            handle: HandleId::next(),
            table: 0,
        }
    }

    #[test]
    fn test_tuple_selectors_in_order() {
        let table = token();
        let id: Col<i64> = Col::new(table.field(0));
        let name: Col<String> = Col::new(table.field(1));
        let mut selectors = Vec::new();
        (id, upper(name), count(id)).selectors(&mut selectors);
        assert_eq!(
            selectors,
            vec![
                Selector::Field(table.field(0)),
                Selector::Function(table.field(1), Function::Upper),
                Selector::Aggregate(table.field(0), Aggregate::Count),
            ]
        );
    }

    #[test]
    fn test_tuple_decode() {
        let table = token();
        let id: Col<i64> = Col::new(table.field(0));
        let name: Col<Option<String>> = Col::new(table.field(1));
        let mut values =
            vec![SqlValue::Int(3), SqlValue::Null, SqlValue::Float(2.5)].into_iter();
        let (a, b, c) = (id, name, avg(id)).decode(&mut values).unwrap();
        assert_eq!(a, 3);
        assert_eq!(b, None);
        assert_eq!(c, Some(2.5));
    }

    #[test]
    fn test_missing_value_is_null() {
        let table = token();
        let id: Col<i64> = Col::new(table.field(0));
        let mut values = Vec::new().into_iter();
        assert!(matches!(
            id.decode(&mut values),
            Err(ValueError::UnexpectedNull { .. })
        ));
        assert_eq!(max(id).decode(&mut values).unwrap(), None);
    }
}
