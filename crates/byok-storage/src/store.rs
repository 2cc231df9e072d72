// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CredentialStore trait.

use std::collections::HashMap;

use async_trait::async_trait;
use byok_config::model::StorageConfig;
use byok_core::types::{
    AuditEntry, ChainUpdate, CredentialFilter, CredentialUpdate, EncryptedBundle, Environment,
    FallbackChain, Provider, UsageRecord,
};
use byok_core::traits::UpdateFn;
use byok_core::{ByokError, Credential, CredentialStore};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::database::Database;
use crate::queries;

/// SQLite-backed credential store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database named by `[storage]` and run migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, ByokError> {
        let db = Database::from_config(config).await?;
        debug!(path = %config.database_path, "SQLite credential store initialized");
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Most recent audit entries for a tenant, newest first.
    pub async fn recent_audit(
        &self,
        tenant_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, ByokError> {
        queries::audit::list_audit(&self.db, tenant_id, limit).await
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), ByokError> {
        self.db.checkpoint().await
    }
}

/// Start of the retention window, or a configuration error when the window
/// reaches past the representable range.
fn cutoff(retention_days: u32) -> Result<DateTime<Utc>, ByokError> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| {
            ByokError::Configuration(format!(
                "retention of {retention_days} days is out of range"
            ))
        })
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn create(&self, credential: &Credential) -> Result<String, ByokError> {
        let id = queries::credentials::create_credential(&self.db, credential).await?;
        info!(
            credential_id = %id,
            tenant_id = %credential.tenant_id,
            provider = %credential.provider,
            "credential stored"
        );
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Credential>, ByokError> {
        queries::credentials::get_credential(&self.db, id).await
    }

    async fn get_by_hash(
        &self,
        tenant_id: &str,
        key_hash: &str,
    ) -> Result<Option<Credential>, ByokError> {
        queries::credentials::get_by_hash(&self.db, tenant_id, key_hash).await
    }

    async fn list(
        &self,
        tenant_id: &str,
        filter: &CredentialFilter,
    ) -> Result<Vec<Credential>, ByokError> {
        queries::credentials::list_credentials(&self.db, tenant_id, filter).await
    }

    async fn update(&self, id: &str, update: &CredentialUpdate) -> Result<Credential, ByokError> {
        queries::credentials::update_credential(&self.db, id, update).await
    }

    async fn update_with(
        &self,
        id: &str,
        f: UpdateFn,
    ) -> Result<(Credential, Credential), ByokError> {
        queries::credentials::update_credential_with(&self.db, id, f).await
    }

    async fn delete(&self, id: &str) -> Result<(), ByokError> {
        queries::credentials::delete_credential(&self.db, id).await?;
        info!(credential_id = %id, "credential deleted");
        Ok(())
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<u64, ByokError> {
        let removed = queries::credentials::delete_tenant(&self.db, tenant_id).await?;
        info!(tenant_id, removed, "tenant data deleted");
        Ok(removed)
    }

    async fn create_chain(&self, chain: &FallbackChain) -> Result<String, ByokError> {
        queries::chains::create_chain(&self.db, chain).await
    }

    async fn get_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<Option<FallbackChain>, ByokError> {
        queries::chains::get_chain(&self.db, tenant_id, provider, environment).await
    }

    async fn update_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        update: &ChainUpdate,
    ) -> Result<FallbackChain, ByokError> {
        queries::chains::update_chain(&self.db, tenant_id, provider, environment, update).await
    }

    async fn delete_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<(), ByokError> {
        queries::chains::delete_chain(&self.db, tenant_id, provider, environment).await
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), ByokError> {
        queries::usage::record_usage(&self.db, record).await
    }

    async fn usage_counts_since(
        &self,
        credential_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, u64>, ByokError> {
        queries::usage::usage_counts_since(&self.db, credential_ids, since).await
    }

    async fn average_cost(
        &self,
        credential_ids: &[String],
    ) -> Result<HashMap<String, f64>, ByokError> {
        queries::usage::average_cost(&self.db, credential_ids).await
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), ByokError> {
        queries::audit::append_audit(&self.db, entry).await
    }

    async fn list_all_bundles(&self) -> Result<Vec<(String, String, EncryptedBundle)>, ByokError> {
        queries::credentials::list_all_bundles(&self.db).await
    }

    async fn replace_bundles(&self, bundles: &[(String, EncryptedBundle)]) -> Result<(), ByokError> {
        queries::credentials::replace_bundles(&self.db, bundles).await
    }

    async fn cleanup_expired(&self) -> Result<Vec<(String, String)>, ByokError> {
        queries::housekeeping::expire_due(&self.db, Utc::now()).await
    }

    async fn cleanup_old_usage(&self, retention_days: u32) -> Result<u64, ByokError> {
        queries::usage::delete_usage_before(&self.db, cutoff(retention_days)?).await
    }

    async fn cleanup_audit(&self, retention_days: u32) -> Result<u64, ByokError> {
        queries::audit::delete_audit_before(&self.db, cutoff(retention_days)?).await
    }
}
