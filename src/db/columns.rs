//! Text encodings for identifiers, dates and timestamps.
//!
//! Everything is stored as TEXT in fixed-width formats so that string
//! comparison in SQL matches chronological order.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// UTC audit timestamps share the local datetime layout.
pub fn fmt_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(DATETIME_FORMAT).to_string()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse a TEXT column through `FromStr` (uuids, enums).
pub fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub fn parsed_opt<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub fn uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    parsed(row, idx)
}

pub fn uuid_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    parsed_opt(row, idx)
}

pub fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub fn date_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub fn datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub fn datetime_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    datetime(row, idx).map(|naive| naive.and_utc())
}

pub fn timestamp_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    datetime_opt(row, idx).map(|naive| naive.map(|n| n.and_utc()))
}
