// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage record writes and the aggregates the router sorts by.

use std::collections::HashMap;

use byok_core::types::UsageRecord;
use byok_core::ByokError;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::rows::{placeholders, ts};

pub async fn record_usage(db: &Database, record: &UsageRecord) -> Result<(), ByokError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO usage_records
                 (id, tenant_id, credential_id, operation, success, cost_usd, latency_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    r.id,
                    r.tenant_id,
                    r.credential_id,
                    r.operation,
                    r.success,
                    r.cost_usd,
                    r.latency_ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
                    ts(&r.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record count per credential since `since`. Ids without records are absent.
pub async fn usage_counts_since(
    db: &Database,
    credential_ids: &[String],
    since: DateTime<Utc>,
) -> Result<HashMap<String, u64>, ByokError> {
    if credential_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let query = format!(
        "SELECT credential_id, COUNT(*) FROM usage_records
         WHERE created_at >= ?1 AND credential_id IN ({})
         GROUP BY credential_id",
        placeholders(1, credential_ids.len())
    );
    let mut values = vec![Value::Text(ts(&since))];
    values.extend(credential_ids.iter().cloned().map(Value::Text));

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count.max(0) as u64))
            })?;
            rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Mean `cost_usd` per credential over records that carry a cost.
pub async fn average_cost(
    db: &Database,
    credential_ids: &[String],
) -> Result<HashMap<String, f64>, ByokError> {
    if credential_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let query = format!(
        "SELECT credential_id, AVG(cost_usd) FROM usage_records
         WHERE cost_usd IS NOT NULL AND credential_id IN ({})
         GROUP BY credential_id",
        placeholders(0, credential_ids.len())
    );
    let values: Vec<Value> = credential_ids.iter().cloned().map(Value::Text).collect();

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            rows.collect::<rusqlite::Result<HashMap<_, _>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete usage records created before `cutoff`.
pub async fn delete_usage_before(db: &Database, cutoff: DateTime<Utc>) -> Result<u64, ByokError> {
    let cutoff = ts(&cutoff);
    db.connection()
        .call(move |conn| {
            let removed =
                conn.execute("DELETE FROM usage_records WHERE created_at < ?1", params![cutoff])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
