//! The dialect-neutral query model handed to drivers.
//!
//! Builders resolve column tokens into [`Column`]s whose schema, table and
//! column names are already escaped by the driver's keyword handler. A
//! driver only has to assemble the clauses and bind the values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::introspect::Descriptor;
use crate::value::SqlValue;

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// Caller-supplied SQL.
    Raw,
    /// `SELECT`
    Select,
    /// `INSERT`
    Insert,
    /// `UPDATE`
    Update,
    /// `DELETE`
    Delete,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Select => write!(f, "select"),
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl Aggregate {
    /// SQL function name.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    /// `UPPER`
    Upper,
    /// `LOWER`
    Lower,
}

impl Function {
    /// SQL function name.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Upper => "UPPER",
            Self::Lower => "LOWER",
        }
    }
}

/// A table reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Escaped schema namespace.
    pub schema: Option<String>,
    /// Escaped table name.
    pub name: String,
}

/// A projected or filtered column, optionally wrapped in a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Escaped schema namespace.
    pub schema: Option<String>,
    /// Escaped table name.
    pub table: String,
    /// Escaped column name.
    pub name: String,
    /// Aggregate applied to the column.
    pub aggregate: Option<Aggregate>,
    /// Scalar function applied to the column.
    pub function: Option<Function>,
}

impl Column {
    /// Builds the column a descriptor points at, wrapped in its aggregate or
    /// function when the descriptor is one.
    #[must_use]
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        let location = descriptor.column();
        let (aggregate, function) = match descriptor {
            Descriptor::Aggregate { aggregate, .. } => (Some(*aggregate), None),
            Descriptor::Function { function, .. } => (None, Some(*function)),
            _ => (None, None),
        };
        Self {
            schema: location.schema.clone(),
            table: location.table.clone(),
            name: location.column.clone(),
            aggregate,
            function,
        }
    }

    /// Table the column belongs to.
    #[must_use]
    pub fn table_ref(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: self.table.clone(),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// A resolved predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// `column op ?`
    Compare {
        /// Left side.
        column: Column,
        /// Operator.
        op: CompareOp,
        /// Bound value.
        value: SqlValue,
    },
    /// `left op right`
    CompareColumns {
        /// Left side.
        left: Column,
        /// Operator.
        op: CompareOp,
        /// Right side.
        right: Column,
    },
    /// `column IS NULL`
    IsNull(Column),
    /// `column IS NOT NULL`
    IsNotNull(Column),
    /// `column [NOT] IN (?, ...)`
    InList {
        /// Tested column.
        column: Column,
        /// Bound values.
        values: Vec<SqlValue>,
        /// `NOT IN`
        negated: bool,
    },
    /// `(a) AND (b)`
    And(Box<Operation>, Box<Operation>),
    /// `(a) OR (b)`
    Or(Box<Operation>, Box<Operation>),
    /// `NOT (a)`
    Not(Box<Operation>),
}

impl Operation {
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

    /// Folds predicates with `AND`; `None` when the list is empty.
    #[must_use]
    pub fn all(operations: impl IntoIterator<Item = Self>) -> Option<Self> {
        operations.into_iter().reduce(Self::and)
    }
}

/// Join flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// `JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
}

/// A join on column-pair equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Flavour.
    pub kind: JoinKind,
    /// Joined table.
    pub table: TableRef,
    /// Column of a table already in scope.
    pub left: Column,
    /// Column of the joined table.
    pub right: Column,
}

/// An `UPDATE` assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Target column.
    pub column: Column,
    /// New value.
    pub value: SqlValue,
}

/// An `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Sort column.
    pub column: Column,
    /// Descending order.
    pub descending: bool,
}

/// A statement in dialect-neutral form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Statement kind.
    pub kind: QueryKind,
    /// Target (`FROM`, `INTO`, `UPDATE`) table.
    pub table: Option<TableRef>,
    /// Projection for selects, column list for inserts.
    pub columns: Vec<Column>,
    /// Insert rows, one value per column.
    pub rows: Vec<Vec<SqlValue>>,
    /// `WHERE`
    pub filter: Option<Operation>,
    /// Joins in order.
    pub joins: Vec<Join>,
    /// `SET` assignments.
    pub sets: Vec<Assignment>,
    /// Column returned by an insert.
    pub returning: Option<Column>,
    /// `ORDER BY`
    pub order_by: Vec<OrderBy>,
    /// `LIMIT`
    pub limit: Option<u64>,
    /// `OFFSET`
    pub offset: Option<u64>,
    /// Raw statement text.
    pub raw_sql: Option<String>,
    /// Raw statement arguments.
    pub arguments: Vec<SqlValue>,
}

impl Query {
    /// Creates an empty statement of `kind` against `table`.
    #[must_use]
    pub const fn new(kind: QueryKind, table: Option<TableRef>) -> Self {
        Self {
            kind,
            table,
            columns: Vec::new(),
            rows: Vec::new(),
            filter: None,
            joins: Vec::new(),
            sets: Vec::new(),
            returning: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            raw_sql: None,
            arguments: Vec::new(),
        }
    }

    /// A raw statement.
    #[must_use]
    pub fn raw(sql: impl Into<String>, arguments: Vec<SqlValue>) -> Self {
        Self {
            raw_sql: Some(sql.into()),
            arguments,
            ..Self::new(QueryKind::Raw, None)
        }
    }

    /// Name of the target table for log lines.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.table.as_ref().map_or("", |t| t.name.as_str())
    }
}
