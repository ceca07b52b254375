//! Moving [`SqlValue`]s in and out of sqlx.

use ferrent_core::SqlValue;
use ferrent_orm::{DriverResult, Row};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row as _, Sqlite, TypeInfo, ValueRef};

use crate::error::driver_error;

pub(crate) type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds a value to a query.
pub(crate) fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    }
}

/// Builds a query from SQL text and its arguments.
pub(crate) fn prepare<'q>(sql: &'q str, arguments: &[SqlValue]) -> SqliteQuery<'q> {
    arguments
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value))
}

/// Reads every column of a row by its storage class.
pub(crate) fn decode_row(row: &SqliteRow) -> DriverResult<Row> {
    (0..row.len()).map(|i| decode_value(row, i)).collect()
}

fn decode_value(row: &SqliteRow, index: usize) -> DriverResult<SqlValue> {
    let storage = {
        let raw = row.try_get_raw(index).map_err(driver_error)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        Storage::of(raw.type_info().name())
    };
    let value = match storage {
        Storage::Integer => SqlValue::Int(row.try_get_unchecked(index).map_err(driver_error)?),
        Storage::Real => SqlValue::Float(row.try_get_unchecked(index).map_err(driver_error)?),
        Storage::Blob => SqlValue::Blob(row.try_get_unchecked(index).map_err(driver_error)?),
        Storage::Text => SqlValue::Text(row.try_get_unchecked(index).map_err(driver_error)?),
    };
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Integer,
    Real,
    Text,
    Blob,
}

impl Storage {
    fn of(type_name: &str) -> Self {
        match type_name {
            "INTEGER" | "BIGINT" | "INT8" | "BOOLEAN" => Self::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Self::Real,
            "BLOB" => Self::Blob,
            _ => Self::Text,
        }
    }
}
