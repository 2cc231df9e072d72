// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback chain operations, scoped by (tenant, provider, environment).

use std::collections::HashSet;

use byok_core::types::{ChainUpdate, Environment, FallbackChain, Provider};
use byok_core::ByokError;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, is_unique_violation, map_call_err, map_tr_err, sql};
use crate::rows::{self, CHAIN_COLUMNS, chain_from_row, ts};

/// Check the member list against the chain's tenant and provider.
fn validate_members(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    provider: Provider,
    ids: &[String],
) -> Result<(), ByokError> {
    if ids.is_empty() {
        return Err(ByokError::Configuration(
            "fallback chain must list at least one credential".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(ByokError::Configuration(format!(
                "credential {id} appears more than once in the chain"
            )));
        }
        let owner: Option<(String, String)> = conn
            .query_row(
                "SELECT tenant_id, provider FROM credentials WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(sql)?;
        match owner {
            Some((tenant, prov)) if tenant == tenant_id && prov == provider.to_string() => {}
            Some(_) => {
                return Err(ByokError::Configuration(format!(
                    "credential {id} does not belong to {tenant_id}/{provider}"
                )));
            }
            None => {
                return Err(ByokError::Configuration(format!(
                    "credential {id} does not exist"
                )));
            }
        }
    }
    Ok(())
}

fn select_chain(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    provider: Provider,
    environment: Environment,
) -> rusqlite::Result<Option<FallbackChain>> {
    conn.query_row(
        &format!(
            "SELECT {CHAIN_COLUMNS} FROM fallback_chains
             WHERE tenant_id = ?1 AND provider = ?2 AND environment = ?3"
        ),
        params![tenant_id, provider.to_string(), environment.to_string()],
        chain_from_row,
    )
    .optional()
}

/// Insert a chain. One chain per triple; members are validated first.
pub async fn create_chain(db: &Database, chain: &FallbackChain) -> Result<String, ByokError> {
    let chain = chain.clone();
    db.connection()
        .call(move |conn| -> Result<String, ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            validate_members(&tx, &chain.tenant_id, chain.provider, &chain.credential_ids)?;
            let ids = rows::to_json(&chain.credential_ids).map_err(sql)?;
            let result = tx.execute(
                &format!(
                    "INSERT INTO fallback_chains ({CHAIN_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    chain.id,
                    chain.tenant_id,
                    chain.provider.to_string(),
                    chain.environment.to_string(),
                    ids,
                    chain.strategy.to_string(),
                    chain.enabled,
                    ts(&chain.created_at),
                    ts(&chain.updated_at),
                ],
            );
            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(ByokError::Configuration(format!(
                        "a fallback chain already exists for {}/{}/{}",
                        chain.tenant_id, chain.provider, chain.environment
                    )));
                }
                Err(e) => return Err(sql(e)),
            }
            tx.commit().map_err(sql)?;
            Ok(chain.id.clone())
        })
        .await
        .map_err(map_call_err)
}

pub async fn get_chain(
    db: &Database,
    tenant_id: &str,
    provider: Provider,
    environment: Environment,
) -> Result<Option<FallbackChain>, ByokError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| select_chain(conn, &tenant_id, provider, environment))
        .await
        .map_err(map_tr_err)
}

pub async fn update_chain(
    db: &Database,
    tenant_id: &str,
    provider: Provider,
    environment: Environment,
    update: &ChainUpdate,
) -> Result<FallbackChain, ByokError> {
    let tenant_id = tenant_id.to_string();
    let update = update.clone();
    db.connection()
        .call(move |conn| -> Result<FallbackChain, ByokError> {
            let tx = conn.transaction().map_err(sql)?;
            let mut chain = select_chain(&tx, &tenant_id, provider, environment)
                .map_err(sql)?
                .ok_or_else(|| ByokError::ChainNotFound {
                    tenant_id: tenant_id.clone(),
                    provider,
                    environment,
                })?;

            if let Some(ids) = update.credential_ids {
                validate_members(&tx, &tenant_id, provider, &ids)?;
                chain.credential_ids = ids;
            }
            if let Some(strategy) = update.strategy {
                chain.strategy = strategy;
            }
            if let Some(enabled) = update.enabled {
                chain.enabled = enabled;
            }
            chain.updated_at = Utc::now();

            let ids = rows::to_json(&chain.credential_ids).map_err(sql)?;
            tx.execute(
                "UPDATE fallback_chains
                 SET credential_ids = ?2, strategy = ?3, enabled = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    chain.id,
                    ids,
                    chain.strategy.to_string(),
                    chain.enabled,
                    ts(&chain.updated_at),
                ],
            )
            .map_err(sql)?;
            tx.commit().map_err(sql)?;
            Ok(chain)
        })
        .await
        .map_err(map_call_err)
}

pub async fn delete_chain(
    db: &Database,
    tenant_id: &str,
    provider: Provider,
    environment: Environment,
) -> Result<(), ByokError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), ByokError> {
            let removed = conn
                .execute(
                    "DELETE FROM fallback_chains
                     WHERE tenant_id = ?1 AND provider = ?2 AND environment = ?3",
                    params![tenant_id, provider.to_string(), environment.to_string()],
                )
                .map_err(sql)?;
            if removed == 0 {
                return Err(ByokError::ChainNotFound {
                    tenant_id,
                    provider,
                    environment,
                });
            }
            Ok(())
        })
        .await
        .map_err(map_call_err)
}

/// Drop `credential_id` from every chain of the tenant that lists it.
/// Runs inside the caller's transaction.
pub(crate) fn remove_member(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    credential_id: &str,
) -> rusqlite::Result<usize> {
    let members: Vec<(String, String)> = {
        let mut stmt =
            conn.prepare("SELECT id, credential_ids FROM fallback_chains WHERE tenant_id = ?1")?;
        let rows = stmt.query_map(params![tenant_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let now = ts(&Utc::now());
    let mut shortened = 0;
    for (chain_id, raw) in members {
        let ids: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e)))?;
        if !ids.iter().any(|id| id == credential_id) {
            continue;
        }
        let kept: Vec<&String> = ids.iter().filter(|id| *id != credential_id).collect();
        conn.execute(
            "UPDATE fallback_chains SET credential_ids = ?2, updated_at = ?3 WHERE id = ?1",
            params![chain_id, rows::to_json(&kept)?, now],
        )?;
        shortened += 1;
    }
    if shortened > 0 {
        debug!(credential_id, chains = shortened, "removed deleted credential from chains");
    }
    Ok(shortened)
}
