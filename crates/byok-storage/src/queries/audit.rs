// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log.

use byok_core::types::AuditEntry;
use byok_core::ByokError;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::rows::{get_enum, get_ts, ts};

pub async fn append_audit(db: &Database, entry: &AuditEntry) -> Result<(), ByokError> {
    let e = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO audit_log (id, tenant_id, credential_id, event, success, context, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    e.id,
                    e.tenant_id,
                    e.credential_id,
                    e.event.to_string(),
                    e.success,
                    e.context,
                    ts(&e.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent entries for a tenant, newest first.
pub async fn list_audit(
    db: &Database,
    tenant_id: &str,
    limit: u32,
) -> Result<Vec<AuditEntry>, ByokError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, credential_id, event, success, context, created_at
                 FROM audit_log WHERE tenant_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![tenant_id, limit], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    credential_id: row.get(2)?,
                    event: get_enum(row, 3)?,
                    success: row.get(4)?,
                    context: row.get(5)?,
                    created_at: get_ts(row, 6)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete audit entries created before `cutoff`.
pub async fn delete_audit_before(db: &Database, cutoff: DateTime<Utc>) -> Result<u64, ByokError> {
    let cutoff = ts(&cutoff);
    db.connection()
        .call(move |conn| {
            let removed =
                conn.execute("DELETE FROM audit_log WHERE created_at < ?1", params![cutoff])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
