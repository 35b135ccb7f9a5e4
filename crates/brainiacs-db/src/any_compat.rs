//! AnyPool row helpers.
//!
//! `sqlx::AnyPool` only natively decodes primitive types (i8/i16/i32/i64,
//! f32/f64, bool, String, &[u8]). Every column that stores a UUID, a
//! timestamp or a JSON document is stored as `TEXT` and converted here, in
//! both directions.
//!
//! Decoders return `sqlx::Error` so they slot into `FromRow`-style mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Row, any::AnyRow};
use uuid::Uuid;

fn decode_err<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}

// ── Uuid ─────────────────────────────────────────────────────────────────────

pub fn get_uuid(row: &AnyRow, col: &str) -> Result<Uuid, sqlx::Error> {
    let s: String = row.try_get(col)?;
    Uuid::parse_str(&s).map_err(decode_err)
}

// ── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Timestamps are written as RFC 3339 with fixed microsecond precision so
/// that text ordering matches time ordering.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn get_datetime(row: &AnyRow, col: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let s: String = row.try_get(col)?;
    parse_datetime(&s).map_err(sqlx::Error::Decode)
}

pub fn get_opt_datetime(row: &AnyRow, col: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let s: Option<String> = row.try_get(col)?;
    s.map(|v| parse_datetime(&v).map_err(sqlx::Error::Decode))
        .transpose()
}

fn parse_datetime(
    s: &str,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error + Send + Sync + 'static>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Rows written by hand in SQLite use CURRENT_TIMESTAMP: "2024-01-15 10:30:00"
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt.and_utc());
    }
    Err(format!("cannot parse timestamp: {s}").into())
}

// ── JSON documents ───────────────────────────────────────────────────────────

pub fn get_json<T: DeserializeOwned>(row: &AnyRow, col: &str) -> Result<T, sqlx::Error> {
    let s: String = row.try_get(col)?;
    serde_json::from_str(&s).map_err(decode_err)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// `LIKE` pattern matching one id inside a JSON array of id strings.
pub fn json_array_contains(id: Uuid) -> String {
    format!("%\"{id}\"%")
}

/// `LIKE` pattern for a case-insensitive substring match; the caller lowers
/// the column. `%`, `_` and `\` in the needle are escaped.
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
