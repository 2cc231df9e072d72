// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential CRUD operations.

use byok_core::types::{CredentialFilter, CredentialStatus, CredentialUpdate, EncryptedBundle};
use byok_core::traits::UpdateFn;
use byok_core::{ByokError, Credential};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::{Database, is_unique_violation, map_call_err, map_tr_err, sql};
use crate::queries::chains;
use crate::rows::{self, CREDENTIAL_COLUMNS, credential_from_row, ts, ts_opt};

/// Insert a new credential. A repeated `key_hash` for the tenant is a
/// `DuplicateCredential`; nothing is overwritten.
pub async fn create_credential(db: &Database, credential: &Credential) -> Result<String, ByokError> {
    let c = credential.clone();
    db.connection()
        .call(move |conn| -> Result<String, ByokError> {
            let capabilities = rows::to_json(&c.capabilities).map_err(sql)?;
            let metadata = rows::to_json(&c.metadata).map_err(sql)?;
            let result = conn.execute(
                &format!(
                    "INSERT INTO credentials ({CREDENTIAL_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                             ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
                ),
                params![
                    c.id,
                    c.tenant_id,
                    c.provider.to_string(),
                    c.environment.to_string(),
                    c.alias,
                    c.description,
                    capabilities,
                    metadata,
                    c.bundle.ciphertext,
                    c.bundle.salt,
                    c.bundle.nonce,
                    c.bundle.auth_tag,
                    c.key_hash,
                    c.status.to_string(),
                    i64::from(c.health_score),
                    i64::from(c.validation_failures),
                    ts_opt(&c.last_validated_at),
                    ts_opt(&c.expires_at),
                    ts(&c.created_at),
                    ts(&c.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(c.id.clone()),
                Err(e) if is_unique_violation(&e) => Err(ByokError::DuplicateCredential {
                    tenant_id: c.tenant_id.clone(),
                    provider: c.provider,
                }),
                Err(e) => Err(sql(e)),
            }
        })
        .await
        .map_err(map_call_err)
}

pub(crate) fn select_by_id(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Credential>> {
    conn.query_row(
        &format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?1"),
        params![id],
        credential_from_row,
    )
    .optional()
}

/// Get a credential by id.
pub async fn get_credential(db: &Database, id: &str) -> Result<Option<Credential>, ByokError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_by_id(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// Get a credential by its secret fingerprint within a tenant.
pub async fn get_by_hash(
    db: &Database,
    tenant_id: &str,
    key_hash: &str,
) -> Result<Option<Credential>, ByokError> {
    let tenant_id = tenant_id.to_string();
    let key_hash = key_hash.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CREDENTIAL_COLUMNS} FROM credentials
                     WHERE tenant_id = ?1 AND key_hash = ?2"
                ),
                params![tenant_id, key_hash],
                credential_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List a tenant's credentials, oldest first.
pub async fn list_credentials(
    db: &Database,
    tenant_id: &str,
    filter: &CredentialFilter,
) -> Result<Vec<Credential>, ByokError> {
    let mut query = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE tenant_id = ?1");
    let mut values = vec![Value::Text(tenant_id.to_string())];

    if let Some(provider) = filter.provider {
        values.push(Value::Text(provider.to_string()));
        query.push_str(&format!(" AND provider = ?{}", values.len()));
    }
    if let Some(environment) = filter.environment {
        values.push(Value::Text(environment.to_string()));
        query.push_str(&format!(" AND environment = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Value::Text(status.to_string()));
        query.push_str(&format!(" AND status = ?{}", values.len()));
    }
    if !filter.include_expired {
        values.push(Value::Text(CredentialStatus::Expired.to_string()));
        let status_idx = values.len();
        values.push(Value::Text(ts(&Utc::now())));
        query.push_str(&format!(
            " AND status != ?{status_idx} AND (expires_at IS NULL OR expires_at > ?{})",
            values.len()
        ));
    }
    query.push_str(" ORDER BY created_at ASC, id ASC");

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(values), credential_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply `update` to `existing`, stamping `updated_at`.
fn apply_update(
    mut credential: Credential,
    update: CredentialUpdate,
) -> Result<Credential, ByokError> {
    if let Some(score) = update.health_score
        && score > 100
    {
        return Err(ByokError::Validation(format!(
            "health_score must be between 0 and 100, got {score}"
        )));
    }

    if let Some(alias) = update.alias {
        credential.alias = alias;
    }
    if let Some(description) = update.description {
        credential.description = description;
    }
    if let Some(capabilities) = update.capabilities {
        credential.capabilities = capabilities;
    }
    if let Some(metadata) = update.metadata {
        credential.metadata = metadata;
    }
    if let Some(secret) = update.secret {
        credential.bundle = secret.bundle;
        if let Some(key_hash) = secret.key_hash {
            credential.key_hash = key_hash;
        }
    }
    if let Some(status) = update.status {
        credential.status = status;
    }
    if let Some(score) = update.health_score {
        credential.health_score = score;
    }
    if let Some(failures) = update.validation_failures {
        credential.validation_failures = failures;
    }
    if let Some(at) = update.last_validated_at {
        credential.last_validated_at = Some(at);
    }
    if let Some(expires_at) = update.expires_at {
        credential.expires_at = expires_at;
    }
    credential.updated_at = Utc::now();
    Ok(credential)
}

fn write_row(conn: &rusqlite::Connection, c: &Credential) -> Result<(), ByokError> {
    let capabilities = rows::to_json(&c.capabilities).map_err(sql)?;
    let metadata = rows::to_json(&c.metadata).map_err(sql)?;
    let result = conn.execute(
        "UPDATE credentials SET
            alias = ?2, description = ?3, capabilities = ?4, metadata = ?5,
            ciphertext = ?6, salt = ?7, nonce = ?8, auth_tag = ?9, key_hash = ?10,
            status = ?11, health_score = ?12, validation_failures = ?13,
            last_validated_at = ?14, expires_at = ?15, updated_at = ?16
         WHERE id = ?1",
        params![
            c.id,
            c.alias,
            c.description,
            capabilities,
            metadata,
            c.bundle.ciphertext,
            c.bundle.salt,
            c.bundle.nonce,
            c.bundle.auth_tag,
            c.key_hash,
            c.status.to_string(),
            i64::from(c.health_score),
            i64::from(c.validation_failures),
            ts_opt(&c.last_validated_at),
            ts_opt(&c.expires_at),
            ts(&c.updated_at),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(ByokError::DuplicateCredential {
            tenant_id: c.tenant_id.clone(),
            provider: c.provider,
        }),
        Err(e) => Err(sql(e)),
    }
}

/// Partial update in one transaction. Returns the stored row.
pub async fn update_credential(
    db: &Database,
    id: &str,
    update: &CredentialUpdate,
) -> Result<Credential, ByokError> {
    let id = id.to_string();
    let update = update.clone();
    db.connection()
        .call(move |conn| -> Result<Credential, ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            let existing = select_by_id(&tx, &id)
                .map_err(sql)?
                .ok_or_else(|| ByokError::CredentialNotFound(id.clone()))?;
            let updated = apply_update(existing, update)?;
            write_row(&tx, &updated)?;
            tx.commit().map_err(sql)?;
            Ok(updated)
        })
        .await
        .map_err(map_call_err)
}

/// Read-modify-write in one transaction: `f` sees the committed row and
/// returns the update to apply. Returns the row before and after.
pub async fn update_credential_with(
    db: &Database,
    id: &str,
    f: UpdateFn,
) -> Result<(Credential, Credential), ByokError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(Credential, Credential), ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            let existing = select_by_id(&tx, &id)
                .map_err(sql)?
                .ok_or_else(|| ByokError::CredentialNotFound(id.clone()))?;
            let update = f(&existing)?;
            let updated = apply_update(existing.clone(), update)?;
            write_row(&tx, &updated)?;
            tx.commit().map_err(sql)?;
            Ok((existing, updated))
        })
        .await
        .map_err(map_call_err)
}

/// Hard delete. Chains referencing the id are shortened in the same
/// transaction; usage rows go with the credential.
pub async fn delete_credential(db: &Database, id: &str) -> Result<(), ByokError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            let tenant_id: String = tx
                .query_row(
                    "SELECT tenant_id FROM credentials WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql)?
                .ok_or_else(|| ByokError::CredentialNotFound(id.clone()))?;

            tx.execute("DELETE FROM credentials WHERE id = ?1", params![id])
                .map_err(sql)?;
            chains::remove_member(&tx, &tenant_id, &id).map_err(sql)?;
            tx.commit().map_err(sql)?;
            Ok(())
        })
        .await
        .map_err(map_call_err)
}

/// Remove everything a tenant owns except its audit trail.
pub async fn delete_tenant(db: &Database, tenant_id: &str) -> Result<u64, ByokError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM usage_records WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            tx.execute(
                "DELETE FROM fallback_chains WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            let removed = tx.execute(
                "DELETE FROM credentials WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Every credential's (id, tenant_id, bundle), for master rotation.
pub async fn list_all_bundles(
    db: &Database,
) -> Result<Vec<(String, String, EncryptedBundle)>, ByokError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, ciphertext, salt, nonce, auth_tag
                 FROM credentials ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    EncryptedBundle {
                        ciphertext: row.get(2)?,
                        salt: row.get(3)?,
                        nonce: row.get(4)?,
                        auth_tag: row.get(5)?,
                    },
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Swap bundles for many credentials atomically. Key hashes are untouched.
pub async fn replace_bundles(
    db: &Database,
    bundles: &[(String, EncryptedBundle)],
) -> Result<(), ByokError> {
    let bundles = bundles.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            let now = ts(&Utc::now());
            for (id, bundle) in &bundles {
                let changed = tx
                    .execute(
                        "UPDATE credentials
                         SET ciphertext = ?2, salt = ?3, nonce = ?4, auth_tag = ?5, updated_at = ?6
                         WHERE id = ?1",
                        params![
                            id,
                            bundle.ciphertext,
                            bundle.salt,
                            bundle.nonce,
                            bundle.auth_tag,
                            now,
                        ],
                    )
                    .map_err(sql)?;
                if changed == 0 {
                    // Dropping the transaction rolls back earlier rows.
                    return Err(ByokError::CredentialNotFound(id.clone()));
                }
            }
            tx.commit().map_err(sql)?;
            Ok(())
        })
        .await
        .map_err(map_call_err)
}
