//! Column encodings shared by the row model and the SQLite store
//!
//! - Identifiers: 16-byte big-endian BLOBs
//! - Timestamps: RFC 3339 text with nanoseconds, UTC
//! - Dates: `YYYY-MM-DD` text

use crate::StoreError;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Encode a raw id value for storage
pub fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decode a stored id value
pub fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
    let arr: [u8; 16] = bytes.try_into().map_err(|_| {
        StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
    })?;
    Ok(u128::from_be_bytes(arr))
}

/// Encode a timestamp without losing precision
pub fn time_to_text(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Decode a stored timestamp
pub fn text_to_time(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Encode a date
pub fn date_to_text(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Decode a stored date
pub fn text_to_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::InvalidData(format!("Invalid date '{}': {}", s, e)))
}

fn conversion_failure(idx: usize, ty: Type, e: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

/// Read an id column inside a row mapper
pub(crate) fn id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u128> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes_to_id(&bytes).map_err(|e| conversion_failure(idx, Type::Blob, e))
}

/// Read a timestamp column inside a row mapper
pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    text_to_time(&text).map_err(|e| conversion_failure(idx, Type::Text, e))
}

/// Read a nullable timestamp column inside a row mapper
pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| text_to_time(&t).map_err(|e| conversion_failure(idx, Type::Text, e)))
        .transpose()
}

/// Read a nullable date column inside a row mapper
pub(crate) fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| text_to_date(&t).map_err(|e| conversion_failure(idx, Type::Text, e)))
        .transpose()
}

/// Read a text column holding an enum name inside a row mapper
pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| {
        conversion_failure(
            idx,
            Type::Text,
            StoreError::InvalidData(format!("Unknown {}: {}", what, text)),
        )
    })
}
