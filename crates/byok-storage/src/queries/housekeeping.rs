// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-driven status transitions.

use byok_core::types::CredentialStatus;
use byok_core::ByokError;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::rows::ts;

/// Move credentials whose `expires_at` is at or before `now` to `expired`.
///
/// Already-expired and revoked rows are left alone; the row is kept so its
/// audit history stays intact. Returns the `(id, tenant_id)` pairs changed.
pub async fn expire_due(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, ByokError> {
    let now = ts(&now);
    let expired = CredentialStatus::Expired.to_string();
    let revoked = CredentialStatus::Revoked.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let due: Vec<(String, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, tenant_id FROM credentials
                     WHERE expires_at IS NOT NULL AND expires_at <= ?1
                       AND status NOT IN (?2, ?3)
                     ORDER BY expires_at ASC",
                )?;
                let rows = stmt.query_map(params![now, expired, revoked], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            for (id, _) in &due {
                tx.execute(
                    "UPDATE credentials SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![id, expired, now],
                )?;
            }
            tx.commit()?;
            Ok(due)
        })
        .await
        .map_err(map_tr_err)
}
