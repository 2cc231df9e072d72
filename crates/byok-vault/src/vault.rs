// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential-management surface.

use std::collections::BTreeSet;
use std::sync::Arc;

use byok_config::ByokConfig;
use byok_config::model::HousekeepingConfig;
use byok_core::schema::{validate_capabilities, validate_metadata};
use byok_core::types::{AuditEvent, CredentialStatus, CredentialUpdate, SecretUpdate};
use byok_core::{
    AuditEntry, AuditTrail, ByokError, Capability, Credential, CredentialFilter, CredentialStore,
    Environment, FallbackChain, Metadata, Provider, SecretPayload, SelectionStrategy,
    UsageMetrics,
};
use byok_crypto::{CipherHandle, MasterSecret, TenantCipher, compare_hash, hash_secret};
use byok_router::{BreakerSnapshot, CircuitBreakers, FallbackRouter, SelectedCredential};
use byok_storage::SqliteCredentialStore;
use byok_validator::{ValidationResult, Validator};
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Input for [`CredentialVault::create_credential`].
#[derive(Debug)]
pub struct NewCredential {
    pub tenant_id: String,
    pub provider: Provider,
    pub environment: Environment,
    pub alias: String,
    pub description: Option<String>,
    pub secret: SecretPayload,
    /// Empty means every capability the provider supports.
    pub capabilities: BTreeSet<Capability>,
    pub metadata: Metadata,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        provider: Provider,
        environment: Environment,
        alias: impl Into<String>,
        secret: SecretPayload,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider,
            environment,
            alias: alias.into(),
            description: None,
            secret,
            capabilities: BTreeSet::new(),
            metadata: Metadata::new(),
            expires_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Changes for [`CredentialVault::update_credential`]. `None` keeps a field.
#[derive(Debug, Default)]
pub struct CredentialChanges {
    pub alias: Option<String>,
    pub description: Option<Option<String>>,
    pub capabilities: Option<BTreeSet<Capability>>,
    pub metadata: Option<Metadata>,
    /// Replaces the secret: re-encrypts, re-hashes, and resets health.
    pub secret: Option<SecretPayload>,
    pub status: Option<CredentialStatus>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl CredentialChanges {
    fn is_empty(&self) -> bool {
        self.alias.is_none()
            && self.description.is_none()
            && self.capabilities.is_none()
            && self.metadata.is_none()
            && self.secret.is_none()
            && self.status.is_none()
            && self.expires_at.is_none()
    }

    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("alias", self.alias.is_some()),
            ("description", self.description.is_some()),
            ("capabilities", self.capabilities.is_some()),
            ("metadata", self.metadata.is_some()),
            ("secret", self.secret.is_some()),
            ("status", self.status.is_some()),
            ("expires_at", self.expires_at.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Multi-tenant credential vault.
///
/// Cloning is cheap; clones share the store, cipher, and breakers.
#[derive(Clone)]
pub struct CredentialVault {
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) cipher: CipherHandle,
    pub(crate) validator: Validator,
    pub(crate) router: FallbackRouter,
    pub(crate) audit: AuditTrail,
    pub(crate) housekeeping: HousekeepingConfig,
    /// Held shared by anything that writes a bundle, exclusively by rotation.
    pub(crate) rotation: Arc<RwLock<()>>,
}

impl CredentialVault {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: TenantCipher,
        validator: Validator,
        config: &ByokConfig,
    ) -> Self {
        let cipher = CipherHandle::new(cipher);
        let router = FallbackRouter::new(store.clone(), cipher.clone(), config.router.clone())
            .with_validator(validator.clone());
        Self {
            audit: AuditTrail::new(store.clone()),
            store,
            cipher,
            validator,
            router,
            housekeeping: config.housekeeping.clone(),
            rotation: Arc::new(RwLock::new(())),
        }
    }

    /// Open the SQLite store and HTTP validator described by `config`.
    pub async fn open(config: &ByokConfig, master: MasterSecret) -> Result<Self, ByokError> {
        let cipher = TenantCipher::from_config(master, &config.vault)?;
        let store = SqliteCredentialStore::open(&config.storage).await?;
        let validator = Validator::http(config.validator.clone())?;
        info!(database = %config.storage.database_path, "credential vault opened");
        Ok(Self::new(Arc::new(store), cipher, validator, config))
    }

    /// Replace the router's breaker set.
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakers>) -> Self {
        self.router = self.router.with_breakers(breakers);
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn router(&self) -> &FallbackRouter {
        &self.router
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Check, encrypt, and store a new credential.
    ///
    /// Schema, capability, and format problems are `Validation` errors and
    /// nothing is written.
    pub async fn create_credential(&self, new: NewCredential) -> Result<Credential, ByokError> {
        if new.tenant_id.trim().is_empty() {
            return Err(ByokError::Validation("tenant_id must not be empty".into()));
        }
        if new.alias.trim().is_empty() {
            return Err(ByokError::Validation("alias must not be empty".into()));
        }
        // Storage keeps millisecond precision.
        let now = Utc::now().trunc_subsecs(3);
        if new.expires_at.is_some_and(|at| at <= now) {
            return Err(ByokError::Validation("expires_at is in the past".into()));
        }
        validate_metadata(new.provider, &new.metadata)?;
        validate_capabilities(new.provider, &new.capabilities)?;
        self.validator
            .check_locally(new.provider, &new.secret, &new.metadata)
            .map_err(ByokError::Validation)?;

        let key_hash = hash_secret(new.secret.api_key());
        let _guard = self.rotation.read().await;
        let bundle = self
            .cipher
            .encrypt_payload(&new.secret, &new.tenant_id)
            .await?;

        let credential = Credential {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: new.tenant_id,
            provider: new.provider,
            environment: new.environment,
            alias: new.alias,
            description: new.description,
            capabilities: new.capabilities,
            metadata: new.metadata,
            bundle,
            key_hash,
            status: CredentialStatus::Active,
            health_score: 100,
            validation_failures: 0,
            last_validated_at: None,
            expires_at: new.expires_at.map(|at| at.trunc_subsecs(3)),
            created_at: now,
            updated_at: now,
        };
        self.store.create(&credential).await?;

        info!(
            credential_id = %credential.id,
            tenant_id = %credential.tenant_id,
            provider = %credential.provider,
            environment = %credential.environment,
            "credential created"
        );
        self.audit
            .credential_event(
                &credential.tenant_id,
                &credential.id,
                AuditEvent::Create,
                true,
                format!("{} {} credential `{}`", credential.environment, credential.provider, credential.alias),
            )
            .await;
        Ok(credential)
    }

    pub async fn get_credential(&self, id: &str) -> Result<Credential, ByokError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ByokError::CredentialNotFound(id.to_string()))
    }

    /// Look up a tenant's credential by its plaintext key without decrypting
    /// anything.
    pub async fn find_by_secret(
        &self,
        tenant_id: &str,
        secret: &SecretPayload,
    ) -> Result<Option<Credential>, ByokError> {
        let hash = hash_secret(secret.api_key());
        Ok(self
            .store
            .get_by_hash(tenant_id, &hash)
            .await?
            .filter(|c| compare_hash(secret.api_key(), &c.key_hash)))
    }

    pub async fn list_credentials(
        &self,
        tenant_id: &str,
        filter: &CredentialFilter,
    ) -> Result<Vec<Credential>, ByokError> {
        self.store.list(tenant_id, filter).await
    }

    /// Decrypt a credential's secret. Audited as a `use`.
    pub async fn reveal_secret(&self, id: &str) -> Result<SecretPayload, ByokError> {
        let credential = self.get_credential(id).await?;
        match self
            .cipher
            .decrypt_payload(&credential.bundle, &credential.tenant_id)
            .await
        {
            Ok(secret) => {
                self.audit
                    .credential_event(&credential.tenant_id, id, AuditEvent::Use, true, "secret revealed")
                    .await;
                Ok(secret)
            }
            Err(e) => {
                warn!(credential_id = id, tenant_id = %credential.tenant_id, error = %e, "failed to decrypt credential");
                self.audit
                    .credential_event(&credential.tenant_id, id, AuditEvent::Use, false, "decryption failed")
                    .await;
                Err(e)
            }
        }
    }

    /// Apply `changes`. A revoked credential only accepts metadata-level
    /// changes; its status is final.
    pub async fn update_credential(
        &self,
        id: &str,
        changes: CredentialChanges,
    ) -> Result<Credential, ByokError> {
        if changes.is_empty() {
            return self.get_credential(id).await;
        }
        let _guard = self.rotation.read().await;
        let current = self.get_credential(id).await?;

        if let Some(alias) = &changes.alias
            && alias.trim().is_empty()
        {
            return Err(ByokError::Validation("alias must not be empty".into()));
        }
        if let Some(metadata) = &changes.metadata {
            validate_metadata(current.provider, metadata)?;
        }
        if let Some(capabilities) = &changes.capabilities {
            validate_capabilities(current.provider, capabilities)?;
        }
        if current.status == CredentialStatus::Revoked
            && (changes.status.is_some_and(|s| s != CredentialStatus::Revoked)
                || changes.secret.is_some())
        {
            return Err(ByokError::Validation(format!(
                "credential {id} is revoked"
            )));
        }

        let mut update = CredentialUpdate {
            alias: changes.alias.clone(),
            description: changes.description.clone(),
            capabilities: changes.capabilities.clone(),
            metadata: changes.metadata.clone(),
            status: changes.status,
            expires_at: changes.expires_at,
            ..Default::default()
        };

        if let Some(secret) = &changes.secret {
            let metadata = changes.metadata.as_ref().unwrap_or(&current.metadata);
            self.validator
                .check_locally(current.provider, secret, metadata)
                .map_err(ByokError::Validation)?;
            let key_hash = hash_secret(secret.api_key());
            if let Some(existing) = self.store.get_by_hash(&current.tenant_id, &key_hash).await?
                && existing.id != current.id
            {
                return Err(ByokError::DuplicateCredential {
                    tenant_id: current.tenant_id.clone(),
                    provider: current.provider,
                });
            }
            let bundle = self
                .cipher
                .encrypt_payload(secret, &current.tenant_id)
                .await?;
            update.secret = Some(SecretUpdate {
                bundle,
                key_hash: Some(key_hash),
            });
            update.health_score = Some(100);
            update.validation_failures = Some(0);
            if update.status.is_none() && current.status == CredentialStatus::Invalid {
                update.status = Some(CredentialStatus::Active);
            }
        }

        let updated = self.store.update(id, &update).await?;
        let event = if updated.status == CredentialStatus::Revoked
            && current.status != CredentialStatus::Revoked
        {
            AuditEvent::Revoke
        } else {
            AuditEvent::Update
        };
        info!(credential_id = id, tenant_id = %updated.tenant_id, fields = ?changes.changed_fields(), "credential updated");
        self.audit
            .credential_event(
                &updated.tenant_id,
                id,
                event,
                true,
                format!("changed: {}", changes.changed_fields().join(", ")),
            )
            .await;
        Ok(updated)
    }

    /// Mark a credential revoked. It is never selected again.
    pub async fn revoke_credential(&self, id: &str) -> Result<Credential, ByokError> {
        let revoked = self
            .update_credential(
                id,
                CredentialChanges {
                    status: Some(CredentialStatus::Revoked),
                    ..Default::default()
                },
            )
            .await?;
        self.router.forget(id);
        Ok(revoked)
    }

    /// Hard delete. Chains drop the id; audit history stays.
    pub async fn delete_credential(&self, id: &str) -> Result<(), ByokError> {
        let credential = self.get_credential(id).await?;
        self.store.delete(id).await?;
        self.router.forget(id);
        self.audit
            .credential_event(
                &credential.tenant_id,
                id,
                AuditEvent::Delete,
                true,
                format!("deleted `{}`", credential.alias),
            )
            .await;
        Ok(())
    }

    /// Remove everything a tenant owns except its audit history. Returns the
    /// number of credentials removed.
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<u64, ByokError> {
        let all = CredentialFilter {
            include_expired: true,
            ..Default::default()
        };
        let owned = self.store.list(tenant_id, &all).await?;
        let removed = self.store.delete_tenant(tenant_id).await?;
        for credential in &owned {
            self.router.forget(&credential.id);
        }
        self.audit
            .record(AuditEntry::new(
                tenant_id,
                None,
                AuditEvent::Delete,
                true,
                format!("tenant deleted with {removed} credentials"),
            ))
            .await;
        Ok(removed)
    }

    /// Decrypt, probe the provider, and fold the result into the stored
    /// health and status.
    pub async fn validate_credential(&self, id: &str) -> Result<ValidationResult, ByokError> {
        let credential = self.get_credential(id).await?;
        let secret = self
            .cipher
            .decrypt_payload(&credential.bundle, &credential.tenant_id)
            .await?;
        let result = self
            .validator
            .validate(credential.provider, &secret, &credential.metadata)
            .await;
        drop(secret);
        self.validator
            .apply(&self.store, &credential, &result)
            .await?;
        Ok(result)
    }

    // --- Runtime selection ---

    pub async fn get_fallback_credential(
        &self,
        tenant_id: &str,
        provider: Provider,
    ) -> Result<SelectedCredential, ByokError> {
        self.router.get_fallback_credential(tenant_id, provider).await
    }

    pub async fn get_fallback_credential_in(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<SelectedCredential, ByokError> {
        self.router
            .get_fallback_credential_in(tenant_id, provider, environment)
            .await
    }

    pub async fn report_success(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        self.router.report_success(credential_id, metrics).await
    }

    pub async fn report_failure(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        self.router.report_failure(credential_id, metrics).await
    }

    pub async fn report_rate_limited(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        self.router.report_rate_limited(credential_id, metrics).await
    }

    pub async fn configure_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        credential_ids: Vec<String>,
        strategy: SelectionStrategy,
    ) -> Result<FallbackChain, ByokError> {
        self.router
            .configure_chain(tenant_id, provider, environment, credential_ids, strategy)
            .await
    }

    pub async fn get_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<Option<FallbackChain>, ByokError> {
        self.router.get_chain(tenant_id, provider, environment).await
    }

    pub async fn toggle_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        enabled: bool,
    ) -> Result<FallbackChain, ByokError> {
        self.router
            .toggle(tenant_id, provider, environment, enabled)
            .await
    }

    pub fn breaker_state(&self, credential_id: &str) -> BreakerSnapshot {
        self.router.breaker_state(credential_id)
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("cipher", &self.cipher)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
