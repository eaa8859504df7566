//! Column decoding shared by the SQL repositories.
//!
//! Instants are stored as Unix seconds and ids as text, the common ground of
//! every driver behind `sqlx::Any`.

use crate::error::DbError;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use sqlx::any::AnyRow;
use sqlx::{Row, ValueRef};
use uuid::Uuid;

pub(crate) fn uuid_column(row: &AnyRow, column: &str) -> Result<Uuid, DbError> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| DbError::MappingError(format!("{column}: {e}")))?;
    Uuid::parse_str(&raw).map_err(|e| DbError::MappingError(format!("{column} '{raw}': {e}")))
}

// The Any driver refuses to decode NULL into `Option<T>`, so NULL is checked first.
fn is_null(row: &AnyRow, column: &str) -> Result<bool, DbError> {
    row.try_get_raw(column)
        .map(|value| value.is_null())
        .map_err(|e| DbError::MappingError(format!("{column}: {e}")))
}

pub(crate) fn optional_uuid_column(row: &AnyRow, column: &str) -> Result<Option<Uuid>, DbError> {
    if is_null(row, column)? {
        return Ok(None);
    }
    uuid_column(row, column).map(Some)
}

pub(crate) fn i64_column(row: &AnyRow, column: &str) -> Result<i64, DbError> {
    row.try_get(column)
        .map_err(|e| DbError::MappingError(format!("{column}: {e}")))
}

pub(crate) fn optional_i64_column(row: &AnyRow, column: &str) -> Result<Option<i64>, DbError> {
    if is_null(row, column)? {
        return Ok(None);
    }
    i64_column(row, column).map(Some)
}

pub(crate) fn string_column(row: &AnyRow, column: &str) -> Result<String, DbError> {
    row.try_get(column)
        .map_err(|e| DbError::MappingError(format!("{column}: {e}")))
}

pub(crate) fn optional_string_column(row: &AnyRow, column: &str) -> Result<Option<String>, DbError> {
    if is_null(row, column)? {
        return Ok(None);
    }
    string_column(row, column).map(Some)
}

pub(crate) fn instant_column(row: &AnyRow, column: &str) -> Result<DateTime<Utc>, DbError> {
    let seconds = i64_column(row, column)?;
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| DbError::MappingError(format!("{column}: {seconds} is out of range")))
}

pub(crate) fn weekday_from_index(index: i64) -> Result<Weekday, DbError> {
    match index {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(DbError::MappingError(format!("weekday {other} is not 0..=6"))),
    }
}

pub(crate) fn time_from_minute(minute: i64) -> Result<NaiveTime, DbError> {
    u32::try_from(minute * 60)
        .ok()
        .and_then(|seconds| NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0))
        .ok_or_else(|| DbError::MappingError(format!("start minute {minute} is not within a day")))
}

/// `$first, $first+1, ...` for `count` bind parameters.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ")
}
