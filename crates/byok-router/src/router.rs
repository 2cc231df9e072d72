// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fallback-chain credential selection with circuit breaking.

use std::sync::Arc;
use std::time::Duration;

use byok_config::model::RouterConfig;
use byok_core::types::{AuditEvent, CredentialStatus, CredentialUpdate};
use byok_core::{
    AuditTrail, ByokError, ChainUpdate, Credential, CredentialFilter, CredentialStore,
    Environment, FallbackChain, Provider, SecretPayload, SelectionStrategy, UsageMetrics,
    UsageRecord,
};
use byok_crypto::CipherHandle;
use byok_validator::Validator;
use chrono::Utc;
use dashmap::DashSet;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::breaker::{Admission, BreakerSnapshot, CircuitBreakers};
use crate::strategy::order_candidates;

/// A decrypted credential handed to a runtime consumer.
#[derive(Debug)]
pub struct SelectedCredential {
    pub credential: Credential,
    pub secret: SecretPayload,
    /// The caller holds the breaker's half-open trial and must report back.
    pub half_open_trial: bool,
}

/// Picks the best usable credential for a tenant and provider, and turns
/// caller feedback into breaker transitions and usage records.
#[derive(Clone)]
pub struct FallbackRouter {
    store: Arc<dyn CredentialStore>,
    cipher: CipherHandle,
    breakers: Arc<CircuitBreakers>,
    audit: AuditTrail,
    validator: Option<Validator>,
    /// Credentials with a re-validation scheduled or running.
    pending: Arc<DashSet<String>>,
    config: RouterConfig,
}

impl FallbackRouter {
    pub fn new(store: Arc<dyn CredentialStore>, cipher: CipherHandle, config: RouterConfig) -> Self {
        Self {
            audit: AuditTrail::new(store.clone()),
            breakers: Arc::new(CircuitBreakers::from_config(&config)),
            store,
            cipher,
            validator: None,
            pending: Arc::new(DashSet::new()),
            config,
        }
    }

    /// Replace the breaker set, e.g. one with a short cooldown.
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakers>) -> Self {
        self.breakers = breakers;
        self
    }

    /// Re-validate credentials in the background when their breaker opens
    /// or the provider throttles them.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakers> {
        &self.breakers
    }

    pub async fn get_fallback_credential(
        &self,
        tenant_id: &str,
        provider: Provider,
    ) -> Result<SelectedCredential, ByokError> {
        self.get_fallback_credential_in(tenant_id, provider, self.config.default_environment)
            .await
    }

    pub async fn get_fallback_credential_in(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<SelectedCredential, ByokError> {
        let now = Utc::now();
        let (candidates, strategy) = self.candidates(tenant_id, provider, environment).await?;
        let ordered = order_candidates(
            self.store.as_ref(),
            candidates,
            strategy,
            self.config.least_used_window_secs,
            now,
        )
        .await?;

        for credential in ordered {
            if credential.tenant_id != tenant_id
                || credential.provider != provider
                || !credential.is_usable_at(now)
            {
                debug!(credential_id = %credential.id, status = %credential.status, "skipping unusable candidate");
                continue;
            }

            let admission = self.breakers.admit(&credential.id);
            if admission == Admission::Rejected {
                debug!(credential_id = %credential.id, "skipping candidate with open breaker");
                continue;
            }

            match self.cipher.decrypt_payload(&credential.bundle, tenant_id).await {
                Ok(secret) => {
                    debug!(
                        tenant_id,
                        %provider,
                        %environment,
                        credential_id = %credential.id,
                        half_open_trial = admission == Admission::Trial,
                        "selected credential"
                    );
                    self.audit
                        .credential_event(
                            tenant_id,
                            &credential.id,
                            AuditEvent::Use,
                            true,
                            format!("selected via {strategy} fallback"),
                        )
                        .await;
                    return Ok(SelectedCredential {
                        credential,
                        secret,
                        half_open_trial: admission == Admission::Trial,
                    });
                }
                Err(e) => {
                    warn!(credential_id = %credential.id, tenant_id, error = %e, "candidate failed to decrypt");
                    self.breakers.record_failure(&credential.id);
                    self.audit
                        .credential_event(
                            tenant_id,
                            &credential.id,
                            AuditEvent::Use,
                            false,
                            "decryption failed",
                        )
                        .await;
                }
            }
        }

        Err(ByokError::NoAvailableCredential {
            tenant_id: tenant_id.to_string(),
            provider,
            environment,
        })
    }

    /// The chain's members in chain order, or every active credential by
    /// health when there is no enabled, non-empty chain.
    async fn candidates(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<(Vec<Credential>, SelectionStrategy), ByokError> {
        if let Some(chain) = self.store.get_chain(tenant_id, provider, environment).await?
            && chain.enabled
            && !chain.credential_ids.is_empty()
        {
            let mut members = Vec::with_capacity(chain.credential_ids.len());
            for id in &chain.credential_ids {
                match self.store.get(id).await? {
                    Some(credential) => members.push(credential),
                    None => debug!(credential_id = %id, "chain member no longer exists"),
                }
            }
            return Ok((members, chain.strategy));
        }

        let filter = CredentialFilter {
            provider: Some(provider),
            environment: Some(environment),
            status: Some(CredentialStatus::Active),
            include_expired: false,
        };
        let mut active = self.store.list(tenant_id, &filter).await?;
        active.sort_by(|a, b| {
            b.health_score
                .cmp(&a.health_score)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok((active, SelectionStrategy::Sequential))
    }

    /// Close the breaker and record a successful use.
    pub async fn report_success(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        let credential = self.load(credential_id).await?;
        self.breakers.record_success(credential_id);
        self.store
            .record_usage(&UsageRecord::new(&credential.tenant_id, credential_id, true, &metrics))
            .await
    }

    /// Count a failure against the breaker and record a failed use.
    /// Opening the breaker schedules an immediate re-validation.
    pub async fn report_failure(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        let credential = self.load(credential_id).await?;
        let opened = self.breakers.record_failure(credential_id);
        self.store
            .record_usage(&UsageRecord::new(&credential.tenant_id, credential_id, false, &metrics))
            .await?;
        if opened {
            self.spawn_revalidation(credential_id, Duration::ZERO);
        }
        Ok(())
    }

    /// Like [`report_failure`](Self::report_failure), and moves an active
    /// credential to `rate_limited`. A rate-limited credential is
    /// re-validated once the breaker cooldown has passed, which restores it
    /// to `active` if the provider accepts it again.
    pub async fn report_rate_limited(
        &self,
        credential_id: &str,
        metrics: UsageMetrics,
    ) -> Result<(), ByokError> {
        let credential = self.load(credential_id).await?;
        self.breakers.record_failure(credential_id);
        self.store
            .record_usage(&UsageRecord::new(&credential.tenant_id, credential_id, false, &metrics))
            .await?;

        let status = if credential.status == CredentialStatus::Active {
            let update = CredentialUpdate {
                status: Some(CredentialStatus::RateLimited),
                ..Default::default()
            };
            info!(credential_id, tenant_id = %credential.tenant_id, "credential rate limited");
            self.store.update(credential_id, &update).await?.status
        } else {
            credential.status
        };

        if status == CredentialStatus::RateLimited {
            self.spawn_revalidation(credential_id, self.breakers.cooldown());
        }
        Ok(())
    }

    /// After `delay`, probe the credential as currently stored and fold the
    /// result into the store.
    ///
    /// Returns `None` when the router has no validator or a re-validation
    /// for the credential is already scheduled.
    pub fn spawn_revalidation(&self, credential_id: &str, delay: Duration) -> Option<JoinHandle<()>> {
        let validator = self.validator.clone()?;
        if !self.pending.insert(credential_id.to_string()) {
            debug!(credential_id, "re-validation already scheduled");
            return None;
        }
        let store = self.store.clone();
        let cipher = self.cipher.clone();
        let pending = self.pending.clone();
        let credential_id = credential_id.to_string();
        Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match revalidate(&store, &cipher, &validator, &credential_id).await {
                Ok(Some(updated)) => debug!(
                    credential_id = %updated.id,
                    status = %updated.status,
                    health_score = updated.health_score,
                    "background re-validation finished"
                ),
                Ok(None) => debug!(%credential_id, "re-validation skipped: credential gone or retired"),
                Err(e) => warn!(%credential_id, error = %e, "background re-validation failed"),
            }
            pending.remove(&credential_id);
        }))
    }

    /// Create the chain for the triple, or replace its members and strategy.
    pub async fn configure_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        credential_ids: Vec<String>,
        strategy: SelectionStrategy,
    ) -> Result<FallbackChain, ByokError> {
        let chain = if self
            .store
            .get_chain(tenant_id, provider, environment)
            .await?
            .is_some()
        {
            let update = ChainUpdate {
                credential_ids: Some(credential_ids),
                strategy: Some(strategy),
                enabled: None,
            };
            self.store
                .update_chain(tenant_id, provider, environment, &update)
                .await?
        } else {
            let chain = FallbackChain::new(tenant_id, provider, environment, credential_ids, strategy);
            self.store.create_chain(&chain).await?;
            chain
        };
        info!(
            tenant_id,
            %provider,
            %environment,
            members = chain.credential_ids.len(),
            strategy = %chain.strategy,
            "fallback chain configured"
        );
        Ok(chain)
    }

    pub async fn get_chain(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
    ) -> Result<Option<FallbackChain>, ByokError> {
        self.store.get_chain(tenant_id, provider, environment).await
    }

    /// Enable or disable a chain. Disabled chains fall back to every active
    /// credential.
    pub async fn toggle(
        &self,
        tenant_id: &str,
        provider: Provider,
        environment: Environment,
        enabled: bool,
    ) -> Result<FallbackChain, ByokError> {
        let update = ChainUpdate {
            enabled: Some(enabled),
            ..Default::default()
        };
        let chain = self
            .store
            .update_chain(tenant_id, provider, environment, &update)
            .await?;
        info!(tenant_id, %provider, %environment, enabled, "fallback chain toggled");
        Ok(chain)
    }

    pub fn breaker_state(&self, credential_id: &str) -> BreakerSnapshot {
        self.breakers.snapshot(credential_id)
    }

    /// Drop breaker state for a deleted credential.
    pub fn forget(&self, credential_id: &str) {
        self.breakers.forget(credential_id);
    }

    async fn load(&self, credential_id: &str) -> Result<Credential, ByokError> {
        self.store
            .get(credential_id)
            .await?
            .ok_or_else(|| ByokError::CredentialNotFound(credential_id.to_string()))
    }
}

async fn revalidate(
    store: &Arc<dyn CredentialStore>,
    cipher: &CipherHandle,
    validator: &Validator,
    credential_id: &str,
) -> Result<Option<Credential>, ByokError> {
    let Some(credential) = store.get(credential_id).await? else {
        return Ok(None);
    };
    if matches!(
        credential.status,
        CredentialStatus::Revoked | CredentialStatus::Expired
    ) {
        return Ok(None);
    }
    let secret = cipher
        .decrypt_payload(&credential.bundle, &credential.tenant_id)
        .await?;
    let result = validator
        .validate(credential.provider, &secret, &credential.metadata)
        .await;
    drop(secret);
    validator.apply(store, &credential, &result).await.map(Some)
}

impl std::fmt::Debug for FallbackRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRouter")
            .field("config", &self.config)
            .field("revalidates", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}
