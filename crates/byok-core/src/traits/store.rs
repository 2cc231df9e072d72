// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence interface for credentials, fallback chains, usage, and audit.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ByokError;
use crate::types::{
    AuditEntry, ChainUpdate, Credential, CredentialFilter, CredentialUpdate, EncryptedBundle,
    Environment, FallbackChain, Provider, UsageRecord,
};

/// Computes a partial update from a credential as currently stored.
///
/// Runs inside the store's write transaction, so it must not block or
/// call back into the store.
pub type UpdateFn =
    Box<dyn FnOnce(&Credential) -> Result<CredentialUpdate, ByokError> + Send + 'static>;

/// Durable store behind the vault.
///
/// Every method may suspend on I/O. Callers must not hold breaker locks or
/// other synchronous guards across these calls.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    // --- Credentials ---

    /// Insert a new credential. Fails with `DuplicateCredential` when the
    /// tenant already holds a credential with the same `key_hash`.
    async fn create(&self, credential: &Credential) -> Result<String, ByokError>;

    async fn get(&self, id: &str) -> Result<Option<Credential>, ByokError>;

    async fn get_by_hash(
        &self,
        tenant_id: &str,
        key_hash: &str,
    ) -> Result<Option<Credential>, ByokError>;

    async fn list(
        &self,
        tenant_id: &str,
        filter: &CredentialFilter,
    ) -> Result<Vec<Credential>, ByokError>;

    /// Apply a partial update and stamp `updated_at`. Returns the updated row.
    async fn update(&self, id: &str, update: &CredentialUpdate) -> Result<Credential, ByokError>;

    /// Read-modify-write against the stored row in one transaction.
    /// Returns the row before and after the update.
    async fn update_with(
        &self,
        id: &str,
        f: UpdateFn,
    ) -> Result<(Credential, Credential), ByokError>;

    /// Hard delete. Also removes the id from every chain that references it.
    async fn delete(&self, id: &str) -> Result<(), ByokError>;

    /// Remove every credential, chain, and usage record owned by the tenant.
    /// Returns the number of credentials removed.
    async fn delete_tenant(&self, tenant_id: &str) -> Result<u64, ByokError>;

    // --- Fallback chains ---

    async fn create_chain(&self, chain: &FallbackChain) -> Result<String, ByokError>;

    async fn get_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<Option<FallbackChain>, ByokError>;

    async fn update_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        update: &ChainUpdate,
    ) -> Result<FallbackChain, ByokError>;

    async fn delete_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<(), ByokError>;

    // --- Usage records ---

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), ByokError>;

    /// Number of usage records per credential created at or after `since`.
    /// Ids with no records are absent from the map.
    async fn usage_counts_since(
        &self,
        credential_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, u64>, ByokError>;

    /// Average recorded `cost_usd` per credential, over records that carry a cost.
    async fn average_cost(
        &self,
        credential_ids: &[String],
    ) -> Result<HashMap<String, f64>, ByokError>;

    // --- Audit ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), ByokError>;

    // --- Master secret rotation ---

    /// Every credential's (id, tenant_id, bundle).
    async fn list_all_bundles(&self) -> Result<Vec<(String, String, EncryptedBundle)>, ByokError>;

    /// Replace bundles for many credentials in one transaction: all or nothing.
    async fn replace_bundles(&self, bundles: &[(String, EncryptedBundle)]) -> Result<(), ByokError>;

    // --- Housekeeping ---

    /// Transition credentials whose `expires_at` has passed to `expired`.
    /// Returns the `(id, tenant_id)` pairs that changed.
    async fn cleanup_expired(&self) -> Result<Vec<(String, String)>, ByokError>;

    /// Delete usage records older than the retention window.
    async fn cleanup_old_usage(&self, retention_days: u32) -> Result<u64, ByokError>;

    /// Delete audit entries older than the retention window.
    async fn cleanup_audit(&self, retention_days: u32) -> Result<u64, ByokError>;
}
