//! Predicates over column tokens.
//!
//! ```ignore
//! use ferrent_orm::filter::{eq, gt, like};
//!
//! let adults = db
//!     .select(&db.person)
//!     .filter(gt(db.person.age, 17).and(like(db.person.name, "A%")))
//!     .all()
//!     .await?;
//! ```

use std::ops::Not;

use ferrent_core::{CompareOp, IntoArgument, Operation, SqlValue};

use crate::database::Shared;
use crate::error::Result;
use crate::projection::{Operand, Selector};

/// A predicate tree over column tokens, resolved against a handle when the
/// statement runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `operand op value`
    Compare {
        /// Left side.
        operand: Selector,
        /// Operator.
        op: CompareOp,
        /// Bound value.
        value: SqlValue,
    },
    /// `left op right`
    CompareOperands {
        /// Left side.
        left: Selector,
        /// Operator.
        op: CompareOp,
        /// Right side.
        right: Selector,
    },
    /// `operand IS NULL`
    IsNull(Selector),
    /// `operand IS NOT NULL`
    IsNotNull(Selector),
    /// `operand [NOT] IN (...)`
    InList {
        /// Tested expression.
        operand: Selector,
        /// Candidates.
        values: Vec<SqlValue>,
        /// `NOT IN`
        negated: bool,
    },
    /// Both hold.
    And(Box<Condition>, Box<Condition>),
    /// Either holds.
    Or(Box<Condition>, Box<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Conjunction.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Disjunction.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub(crate) fn resolve(&self, shared: &Shared) -> Result<Operation> {
        Ok(match self {
            Self::Compare { operand, op, value } => Operation::Compare {
                column: operand.resolve(shared)?,
                op: *op,
                value: value.clone(),
            },
            Self::CompareOperands { left, op, right } => Operation::CompareColumns {
                left: left.resolve(shared)?,
                op: *op,
                right: right.resolve(shared)?,
            },
            Self::IsNull(operand) => Operation::IsNull(operand.resolve(shared)?),
            Self::IsNotNull(operand) => Operation::IsNotNull(operand.resolve(shared)?),
            Self::InList {
                operand,
                values,
                negated,
            } => Operation::InList {
                column: operand.resolve(shared)?,
                values: values.clone(),
                negated: *negated,
            },
            Self::And(a, b) => a.resolve(shared)?.and(b.resolve(shared)?),
            Self::Or(a, b) => a.resolve(shared)?.or(b.resolve(shared)?),
            Self::Not(inner) => Operation::Not(Box::new(inner.resolve(shared)?)),
        })
    }
}

impl Not for Condition {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

fn compare<T, A: IntoArgument<T>>(operand: &impl Operand<T>, op: CompareOp, value: A) -> Condition {
    Condition::Compare {
        operand: operand.selector(),
        op,
        value: value.into_value(),
    }
}

/// `operand = value`
pub fn eq<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Eq, value)
}

/// `operand <> value`
pub fn ne<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Ne, value)
}

/// `operand > value`
pub fn gt<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Gt, value)
}

/// `operand >= value`
pub fn ge<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Ge, value)
}

/// `operand < value`
pub fn lt<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Lt, value)
}

/// `operand <= value`
pub fn le<T, A: IntoArgument<T>>(operand: impl Operand<T>, value: A) -> Condition {
    compare(&operand, CompareOp::Le, value)
}

/// `operand LIKE pattern`
pub fn like<T>(operand: impl Operand<T>, pattern: impl Into<String>) -> Condition {
    Condition::Compare {
        operand: operand.selector(),
        op: CompareOp::Like,
        value: SqlValue::Text(pattern.into()),
    }
}

/// `operand NOT LIKE pattern`
pub fn not_like<T>(operand: impl Operand<T>, pattern: impl Into<String>) -> Condition {
    Condition::Compare {
        operand: operand.selector(),
        op: CompareOp::NotLike,
        value: SqlValue::Text(pattern.into()),
    }
}

/// `operand IS NULL`
pub fn is_null<T>(operand: impl Operand<T>) -> Condition {
    Condition::IsNull(operand.selector())
}

/// `operand IS NOT NULL`
pub fn is_not_null<T>(operand: impl Operand<T>) -> Condition {
    Condition::IsNotNull(operand.selector())
}

/// `operand IN (values)`. An empty list matches nothing.
pub fn in_list<T, A: IntoArgument<T>>(
    operand: impl Operand<T>,
    values: impl IntoIterator<Item = A>,
) -> Condition {
    Condition::InList {
        operand: operand.selector(),
        values: values.into_iter().map(IntoArgument::into_value).collect(),
        negated: false,
    }
}

/// `operand NOT IN (values)`. An empty list matches everything.
pub fn not_in_list<T, A: IntoArgument<T>>(
    operand: impl Operand<T>,
    values: impl IntoIterator<Item = A>,
) -> Condition {
    Condition::InList {
        operand: operand.selector(),
        values: values.into_iter().map(IntoArgument::into_value).collect(),
        negated: true,
    }
}

/// Compares two columns (or functions of them), typically across a join:
/// `compare_columns(db.animal.habitat_id, CompareOp::Eq, db.habitat.id)`.
pub fn compare_columns<T>(
    left: impl Operand<T>,
    op: CompareOp,
    right: impl Operand<T>,
) -> Condition {
    Condition::CompareOperands {
        left: left.selector(),
        op,
        right: right.selector(),
    }
}

/// `left = right` over two columns.
pub fn eq_col<T>(left: impl Operand<T>, right: impl Operand<T>) -> Condition {
    compare_columns(left, CompareOp::Eq, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::lower;
    use ferrent_core::{Col, Function, HandleId, TableToken};

    fn columns() -> (Col<i64>, Col<String>, Col<Option<i64>>) {
        let table = TableToken {
            handle: HandleId::next(),
            table: 0,
        };
        (
            Col::new(table.field(0)),
            Col::new(table.field(1)),
            Col::new(table.field(2)),
        )
    }

    #[test]
    fn test_arguments_follow_column_type() {
        let (id, name, habitat) = columns();
        assert!(matches!(
            eq(name, "Cat"),
            Condition::Compare { value: SqlValue::Text(ref s), op: CompareOp::Eq, .. } if s == "Cat"
        ));
        assert!(matches!(
            gt(habitat, 4_i64),
            Condition::Compare { value: SqlValue::Int(4), .. }
        ));
        assert!(matches!(
            le(id, 9),
            Condition::Compare { value: SqlValue::Int(9), op: CompareOp::Le, .. }
        ));
    }

    #[test]
    fn test_combinators() {
        let (id, name, habitat) = columns();
        let condition = (eq(id, 1).or(is_null(habitat))).and(!like(name, "%x"));
        let Condition::And(left, right) = condition else {
            panic!("expected a conjunction");
        };
        assert!(matches!(*left, Condition::Or(_, _)));
        assert!(matches!(*right, Condition::Not(_)));
    }

    #[test]
    fn test_in_list_and_functions() {
        let (id, name, _) = columns();
        let Condition::InList {
            values, negated, ..
        } = not_in_list(id, [1_i64, 2, 3])
        else {
            panic!("expected an IN list");
        };
        assert_eq!(values.len(), 3);
        assert!(negated);

        let Condition::Compare { operand, .. } = eq(lower(name), "cat") else {
            panic!("expected a comparison");
        };
        assert_eq!(operand, Selector::Function(name.id(), Function::Lower));
    }
}
