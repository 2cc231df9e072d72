// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end vault scenarios.
//!
//! `TestVault` assembles a complete vault with a temp SQLite database, a
//! minimum-iteration cipher, and a [`ScriptedProbe`], so scenario tests run
//! without network access.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use byok_config::ByokConfig;
use byok_config::model::{MIN_KDF_ITERATIONS, StorageConfig};
use byok_core::{AuditEntry, ByokError};
use byok_crypto::{MasterSecret, TenantCipher};
use byok_router::CircuitBreakers;
use byok_storage::{Database, SqliteCredentialStore};
use byok_validator::Validator;
use byok_vault::CredentialVault;
use secrecy::SecretString;

use crate::probe::ScriptedProbe;

/// Master secret every `TestVault` starts with.
pub const TEST_MASTER_SECRET: &str = "Test-Vault-Master-Secret-2026-aaaa-bbbb";

/// A second strong secret, for rotation tests.
pub const ROTATED_MASTER_SECRET: &str = "Rotated-Master-Secret-For-Tests-9999-zz";

pub fn master(secret: &str) -> Result<MasterSecret, ByokError> {
    MasterSecret::new(SecretString::from(secret.to_string()))
}

/// An OpenAI-shaped key that passes the local format check.
pub fn openai_key(tag: &str) -> String {
    format!("sk-{tag:x<24}")
}

/// Builder for [`TestVault`].
pub struct TestVaultBuilder {
    statuses: Vec<u16>,
    breaker: Option<(u32, Duration)>,
    config: ByokConfig,
}

impl TestVaultBuilder {
    fn new() -> Self {
        Self {
            statuses: Vec::new(),
            breaker: None,
            config: ByokConfig::default(),
        }
    }

    /// Statuses the scripted probe answers with, in order.
    pub fn with_probe_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Breaker threshold and cooldown, typically a short cooldown.
    pub fn with_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breaker = Some((threshold, cooldown));
        self
    }

    pub fn with_config(mut self, config: ByokConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<TestVault, ByokError> {
        let temp_dir = tempfile::TempDir::new().map_err(ByokError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        config.vault.kdf_iterations = MIN_KDF_ITERATIONS;

        let db = Database::from_config(&config.storage).await?;
        let store = Arc::new(SqliteCredentialStore::new(db));
        let probe = Arc::new(ScriptedProbe::with_statuses(self.statuses));
        let validator = Validator::new(probe.clone(), config.validator.clone());
        let cipher = TenantCipher::from_config(master(TEST_MASTER_SECRET)?, &config.vault)?;

        let mut vault = CredentialVault::new(store.clone(), cipher, validator, &config);
        if let Some((threshold, cooldown)) = self.breaker {
            vault = vault.with_breakers(Arc::new(CircuitBreakers::new(threshold, cooldown)));
        }

        Ok(TestVault {
            vault,
            store,
            probe,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete vault over a throwaway database.
pub struct TestVault {
    pub vault: CredentialVault,
    /// The concrete store, for reading the audit log.
    pub store: Arc<SqliteCredentialStore>,
    pub probe: Arc<ScriptedProbe>,
    pub config: ByokConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestVault {
    pub fn builder() -> TestVaultBuilder {
        TestVaultBuilder::new()
    }

    pub async fn new() -> Result<Self, ByokError> {
        Self::builder().build().await
    }

    /// Most recent audit entries for a tenant, newest first.
    pub async fn audit(&self, tenant_id: &str) -> Result<Vec<AuditEntry>, ByokError> {
        self.store.recent_audit(tenant_id, 1000).await
    }
}

impl Deref for TestVault {
    type Target = CredentialVault;

    fn deref(&self) -> &Self::Target {
        &self.vault
    }
}
