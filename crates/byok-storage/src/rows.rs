// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column encodings shared by the query modules.
//!
//! Timestamps are fixed-width RFC 3339 text in UTC with millisecond
//! precision, so string comparison in SQL matches chronological order.
//! Enums are stored as their snake_case names; sets and maps as JSON.

use std::str::FromStr;

use byok_core::types::{EncryptedBundle, FallbackChain};
use byok_core::Credential;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

/// Column list matching [`credential_from_row`].
pub const CREDENTIAL_COLUMNS: &str = "id, tenant_id, provider, environment, alias, description, \
     capabilities, metadata, ciphertext, salt, nonce, auth_tag, key_hash, status, health_score, \
     validation_failures, last_validated_at, expires_at, created_at, updated_at";

/// Column list matching [`chain_from_row`].
pub const CHAIN_COLUMNS: &str = "id, tenant_id, provider, environment, credential_ids, strategy, \
     enabled, created_at, updated_at";

pub fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ts_opt(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub fn get_ts_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

/// Parse a strum-backed enum column.
pub fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Parse a JSON text column.
pub fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Serialize a value for a JSON text column.
pub fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let health: i64 = row.get(14)?;
    let failures: i64 = row.get(15)?;
    Ok(Credential {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        provider: get_enum(row, 2)?,
        environment: get_enum(row, 3)?,
        alias: row.get(4)?,
        description: row.get(5)?,
        capabilities: get_json(row, 6)?,
        metadata: get_json(row, 7)?,
        bundle: EncryptedBundle {
            ciphertext: row.get(8)?,
            salt: row.get(9)?,
            nonce: row.get(10)?,
            auth_tag: row.get(11)?,
        },
        key_hash: row.get(12)?,
        status: get_enum(row, 13)?,
        health_score: u8::try_from(health.clamp(0, 100)).unwrap_or(0),
        validation_failures: u32::try_from(failures.max(0)).unwrap_or(u32::MAX),
        last_validated_at: get_ts_opt(row, 16)?,
        expires_at: get_ts_opt(row, 17)?,
        created_at: get_ts(row, 18)?,
        updated_at: get_ts(row, 19)?,
    })
}

pub fn chain_from_row(row: &Row<'_>) -> rusqlite::Result<FallbackChain> {
    Ok(FallbackChain {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        provider: get_enum(row, 2)?,
        environment: get_enum(row, 3)?,
        credential_ids: get_json(row, 4)?,
        strategy: get_enum(row, 5)?,
        enabled: row.get(6)?,
        created_at: get_ts(row, 7)?,
        updated_at: get_ts(row, 8)?,
    })
}

/// `?,?,...` with `n` placeholders starting after `offset` bound parameters.
pub fn placeholders(offset: usize, n: usize) -> String {
    (offset + 1..=offset + n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        assert_eq!(ts(&a), "2026-01-02T03:04:05.000Z");
        assert!(ts(&a) < ts(&b));
        assert_eq!(parse_ts(0, &ts(&b)).unwrap(), b);
    }

    #[test]
    fn placeholders_are_numbered() {
        assert_eq!(placeholders(1, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(0, 1), "?1");
    }
}
