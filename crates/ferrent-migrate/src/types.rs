//! Column type mapping.

use serde::{Deserialize, Serialize};

/// SQL data types a migrated column can take.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Date and time.
    DateTime,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Timestamp with time zone.
    Timestamp,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Binary large object.
    Blob,
    /// A `type:` override, passed through verbatim.
    Custom(String),
}

impl SqlType {
    /// Maps a Rust value type (as written in the entity) to a SQL type.
    /// Unknown types map to [`SqlType::Text`].
    #[must_use]
    pub fn from_rust_type(rust_type: &str) -> Self {
        let base = rust_type.split('<').next().unwrap_or(rust_type);
        let last = base.rsplit("::").next().unwrap_or(base);
        match last {
            "i8" | "i16" | "u8" => Self::SmallInt,
            "i32" | "u16" => Self::Integer,
            "i64" | "u32" | "i128" | "u64" | "u128" | "isize" | "usize" => Self::BigInt,
            "bool" => Self::Boolean,
            "f32" => Self::Real,
            "f64" => Self::Double,
            "Vec" if rust_type.ends_with("<u8>") => Self::Blob,
            "NaiveDateTime" => Self::DateTime,
            "NaiveDate" => Self::Date,
            "NaiveTime" => Self::Time,
            "DateTime" => Self::Timestamp,
            _ => Self::Text,
        }
    }

    /// Returns the SQL type name for SQLite.
    #[must_use]
    pub fn sqlite_name(&self) -> String {
        match self {
            Self::Integer | Self::SmallInt | Self::BigInt | Self::Boolean => "INTEGER".to_string(),
            Self::Text | Self::DateTime | Self::Date | Self::Time | Self::Timestamp => {
                "TEXT".to_string()
            }
            Self::Real | Self::Double => "REAL".to_string(),
            Self::Blob => "BLOB".to_string(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Whether the type holds integers.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::SmallInt | Self::BigInt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rust_type() {
        assert_eq!(SqlType::from_rust_type("i64"), SqlType::BigInt);
        assert_eq!(SqlType::from_rust_type("String"), SqlType::Text);
        assert_eq!(SqlType::from_rust_type("Vec<u8>"), SqlType::Blob);
        assert_eq!(
            SqlType::from_rust_type("chrono::NaiveDateTime"),
            SqlType::DateTime
        );
        assert_eq!(SqlType::from_rust_type("DateTime<Utc>"), SqlType::Timestamp);
        assert_eq!(
            SqlType::from_rust_type("chrono::DateTime<chrono::Utc>"),
            SqlType::Timestamp
        );
    }

    #[test]
    fn test_sqlite_names() {
        assert_eq!(SqlType::BigInt.sqlite_name(), "INTEGER");
        assert_eq!(SqlType::Double.sqlite_name(), "REAL");
        assert_eq!(SqlType::Custom("varchar(10)".into()).sqlite_name(), "varchar(10)");
    }
}
