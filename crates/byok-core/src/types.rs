// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, router, validator, and vault facade.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::schema::Metadata;

/// External service a credential authenticates against.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[strum(serialize = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Deepgram,
    #[strum(serialize = "elevenlabs")]
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    Twilio,
}

impl Provider {
    /// Capabilities this provider can serve.
    pub fn supported_capabilities(&self) -> &'static [Capability] {
        match self {
            Provider::OpenAi => &[
                Capability::Chat,
                Capability::Embeddings,
                Capability::StreamingSpeech,
                Capability::Transcription,
            ],
            Provider::Anthropic => &[Capability::Chat],
            Provider::Gemini => &[Capability::Chat, Capability::Embeddings],
            Provider::Deepgram => &[Capability::Transcription, Capability::StreamingSpeech],
            Provider::ElevenLabs => &[Capability::StreamingSpeech],
            Provider::Twilio => &[Capability::Telephony, Capability::Sms],
        }
    }
}

/// A tag describing what a credential may be used for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Embeddings,
    StreamingSpeech,
    Transcription,
    Telephony,
    Sms,
}

/// Deployment environment a credential is scoped to.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

/// Lifecycle status of a stored credential.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    #[default]
    Active,
    Invalid,
    Expired,
    RateLimited,
    Revoked,
}

/// Output of authenticated encryption. The four parts always travel together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBundle {
    pub ciphertext: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub auth_tag: Vec<u8>,
}

impl std::fmt::Debug for EncryptedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBundle")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("salt_len", &self.salt.len())
            .field("nonce_len", &self.nonce.len())
            .field("auth_tag_len", &self.auth_tag.len())
            .finish()
    }
}

/// A stored credential: metadata plus its encrypted bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub id: String,
    pub tenant_id: String,
    pub provider: Provider,
    pub environment: Environment,
    pub alias: String,
    pub description: Option<String>,
    pub capabilities: BTreeSet<Capability>,
    pub metadata: Metadata,
    pub bundle: EncryptedBundle,
    /// SHA-256 hex digest of the plaintext API key.
    pub key_hash: String,
    pub status: CredentialStatus,
    /// 0-100 rolling health indicator maintained by the validator.
    pub health_score: u8,
    /// Consecutive hard validation failures.
    pub validation_failures: u32,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Whether `expires_at` has passed at `now`, or the status already says so.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CredentialStatus::Expired
            || self.expires_at.is_some_and(|at| at <= now)
    }

    /// Active and not past its expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CredentialStatus::Active && !self.is_expired_at(now)
    }
}

/// Filters for [`crate::CredentialStore::list`].
#[derive(Debug, Clone, Default)]
pub struct CredentialFilter {
    pub provider: Option<Provider>,
    pub environment: Option<Environment>,
    pub status: Option<CredentialStatus>,
    /// Expired credentials are excluded unless this is set.
    pub include_expired: bool,
}

/// New encrypted material for an existing credential.
///
/// `key_hash` is only present when the plaintext itself changed; a master
/// secret rotation re-encrypts the same plaintext and keeps the old hash.
#[derive(Debug, Clone)]
pub struct SecretUpdate {
    pub bundle: EncryptedBundle,
    pub key_hash: Option<String>,
}

/// Partial update for a credential. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub alias: Option<String>,
    pub description: Option<Option<String>>,
    pub capabilities: Option<BTreeSet<Capability>>,
    pub metadata: Option<Metadata>,
    pub secret: Option<SecretUpdate>,
    pub status: Option<CredentialStatus>,
    pub health_score: Option<u8>,
    pub validation_failures: Option<u32>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// How the router orders a chain's candidates.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// First healthy candidate in list order.
    #[default]
    Sequential,
    /// Fewest usage records in the recent window, ties by list order.
    LeastUsed,
    /// Lowest cost per request, ties by list order.
    CostOptimize,
}

/// Ordered fallback list for a (tenant, provider, environment) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackChain {
    pub id: String,
    pub tenant_id: String,
    pub provider: Provider,
    pub environment: Environment,
    pub credential_ids: Vec<String>,
    pub strategy: SelectionStrategy,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FallbackChain {
    /// Build a new enabled chain with fresh id and timestamps.
    pub fn new(
        tenant_id: impl Into<String>,
        provider: Provider,
        environment: Environment,
        credential_ids: Vec<String>,
        strategy: SelectionStrategy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            provider,
            environment,
            credential_ids,
            strategy,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a fallback chain.
#[derive(Debug, Clone, Default)]
pub struct ChainUpdate {
    pub credential_ids: Option<Vec<String>>,
    pub strategy: Option<SelectionStrategy>,
    pub enabled: Option<bool>,
}

/// Caller-reported metrics for one unit of work done with a credential.
#[derive(Debug, Clone, Default)]
pub struct UsageMetrics {
    pub operation: String,
    pub cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
}

impl UsageMetrics {
    pub fn operation(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = Some(cost_usd);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Append-only record of one use of a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub tenant_id: String,
    pub credential_id: String,
    pub operation: String,
    pub success: bool,
    pub cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(
        tenant_id: impl Into<String>,
        credential_id: impl Into<String>,
        success: bool,
        metrics: &UsageMetrics,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            credential_id: credential_id.into(),
            operation: metrics.operation.clone(),
            success,
            cost_usd: metrics.cost_usd,
            latency_ms: metrics.latency_ms,
            created_at: Utc::now(),
        }
    }
}

/// Kind of event recorded in the audit log.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Create,
    Update,
    Delete,
    Validate,
    Use,
    Rotate,
    Expire,
    Revoke,
}

/// Append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub tenant_id: String,
    pub credential_id: Option<String>,
    pub event: AuditEvent,
    pub success: bool,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        tenant_id: impl Into<String>,
        credential_id: Option<String>,
        event: AuditEvent,
        success: bool,
        context: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            credential_id,
            event,
            success,
            context: context.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn provider_names_round_trip() {
        assert_eq!(Provider::OpenAi.to_string(), "openai");
        assert_eq!(Provider::ElevenLabs.to_string(), "elevenlabs");
        assert_eq!(Provider::from_str("openai").unwrap(), Provider::OpenAi);
        assert_eq!(Provider::from_str("twilio").unwrap(), Provider::Twilio);
    }

    #[test]
    fn every_provider_supports_at_least_one_capability() {
        for provider in Provider::iter() {
            assert!(
                !provider.supported_capabilities().is_empty(),
                "{provider} has no capabilities"
            );
        }
    }

    #[test]
    fn status_serde_matches_display() {
        for status in CredentialStatus::iter() {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn strategy_defaults_to_sequential() {
        assert_eq!(SelectionStrategy::default(), SelectionStrategy::Sequential);
        assert_eq!(
            SelectionStrategy::from_str("least_used").unwrap(),
            SelectionStrategy::LeastUsed
        );
    }

    #[test]
    fn bundle_debug_hides_bytes() {
        let bundle = EncryptedBundle {
            ciphertext: vec![0xAB; 8],
            salt: vec![1; 16],
            nonce: vec![2; 12],
            auth_tag: vec![3; 16],
        };
        let out = format!("{bundle:?}");
        assert!(out.contains("ciphertext_len: 8"));
        assert!(!out.contains("171"));
    }

    #[test]
    fn usage_metrics_builder() {
        let m = UsageMetrics::operation("chat").with_cost(0.02).with_latency(120);
        let rec = UsageRecord::new("t1", "c1", true, &m);
        assert_eq!(rec.operation, "chat");
        assert_eq!(rec.cost_usd, Some(0.02));
        assert_eq!(rec.latency_ms, Some(120));
        assert!(!rec.id.is_empty());
    }
}
