//! SQL values and the conversions between them and entity fields.
//!
//! Values always travel as parameters; drivers bind them, nothing is
//! inlined into statement text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A SQL value that can be used as a parameter or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Name of the value's storage class, used in conversion errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "INTEGER",
            Self::Float(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    /// Returns true for [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A Rust type that can be stored in an entity field.
///
/// `Default` supplies the value of fields a projection did not fetch, and
/// [`FieldValue::is_zero`] decides whether a field counts as "unset" for
/// default-bearing inserts, `save` and `remove`.
pub trait FieldValue: Sized + Default + Send + Sync + 'static {
    /// Converts the field to a SQL parameter.
    fn to_value(&self) -> SqlValue;

    /// Reads the field back from a row value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] when the stored value has an incompatible type
    /// or does not fit.
    fn from_value(value: SqlValue) -> Result<Self, ValueError>;

    /// True when the field holds its type's zero value.
    fn is_zero(&self) -> bool;
}

fn mismatch(expected: &'static str, found: &SqlValue) -> ValueError {
    if found.is_null() {
        ValueError::UnexpectedNull { expected }
    } else {
        ValueError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }
}

macro_rules! impl_integer_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn to_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }

                fn from_value(value: SqlValue) -> Result<Self, ValueError> {
                    match value {
                        SqlValue::Int(n) => <$ty>::try_from(n).map_err(|_| ValueError::OutOfRange {
                            expected: stringify!($ty),
                            value: n.to_string(),
                        }),
                        SqlValue::Bool(b) => Ok(<$ty>::from(b)),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

impl_integer_field!(i8, i16, i32, i64, u8, u16, u32);

impl FieldValue for bool {
    fn to_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(n) => Ok(n != 0),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            SqlValue::Int(n) => Ok(n as f64),
            other => Err(mismatch("f64", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl FieldValue for f32 {
    fn to_value(&self) -> SqlValue {
        SqlValue::Float(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        f64::from_value(value).map(|f| f as f32)
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl FieldValue for String {
    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl FieldValue for Vec<u8> {
    fn to_value(&self) -> SqlValue {
        SqlValue::Blob(self.clone())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, FieldValue::to_value)
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

fn parse_text<T>(
    value: SqlValue,
    expected: &'static str,
    parse: impl FnOnce(&str) -> Result<T, chrono::ParseError>,
) -> Result<T, ValueError> {
    match value {
        SqlValue::Text(s) => parse(&s).map_err(|e| ValueError::Parse {
            expected,
            message: e.to_string(),
        }),
        other => Err(mismatch(expected, &other)),
    }
}

impl FieldValue for NaiveDateTime {
    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.format(DATETIME_FORMAT).to_string())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        parse_text(value, "NaiveDateTime", |s| {
            Self::parse_from_str(s, DATETIME_FORMAT).or_else(|_| s.parse())
        })
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for NaiveDate {
    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%d").to_string())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        parse_text(value, "NaiveDate", str::parse)
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for NaiveTime {
    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.format("%H:%M:%S%.f").to_string())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        parse_text(value, "NaiveTime", str::parse)
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FieldValue for DateTime<Utc> {
    fn to_value(&self) -> SqlValue {
        SqlValue::Text(self.to_rfc3339())
    }

    fn from_value(value: SqlValue) -> Result<Self, ValueError> {
        parse_text(value, "DateTime<Utc>", |s| {
            DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
        })
    }

    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// A value accepted as a predicate or `set` argument for a column of type
/// `T`.
///
/// Every field type accepts itself, `Option<T>` columns accept a bare `T`,
/// and text columns accept `&str`.
pub trait IntoArgument<T> {
    /// Converts the argument to a SQL parameter.
    fn into_value(self) -> SqlValue;
}

impl<T: FieldValue> IntoArgument<T> for T {
    fn into_value(self) -> SqlValue {
        self.to_value()
    }
}

impl<T: FieldValue> IntoArgument<Option<T>> for T {
    fn into_value(self) -> SqlValue {
        self.to_value()
    }
}

impl IntoArgument<String> for &str {
    fn into_value(self) -> SqlValue {
        SqlValue::Text(self.to_owned())
    }
}

impl IntoArgument<Option<String>> for &str {
    fn into_value(self) -> SqlValue {
        SqlValue::Text(self.to_owned())
    }
}

impl IntoArgument<Vec<u8>> for &[u8] {
    fn into_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}
