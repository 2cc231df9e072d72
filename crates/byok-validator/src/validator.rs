// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential validation and the status transitions it drives.

use std::sync::Arc;
use std::time::Duration;

use byok_config::model::ValidatorConfig;
use byok_core::schema::{BASE_URL, validate_metadata};
use byok_core::types::{AuditEvent, CredentialStatus, CredentialUpdate};
use byok_core::{AuditTrail, ByokError, Credential, CredentialStore, Metadata, Provider, SecretPayload};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::checks::check_for;
use crate::health::{self, SAMPLE_ACCEPTED, SAMPLE_RATE_LIMITED, SAMPLE_REJECTED, SAMPLE_TRANSIENT};
use crate::probe::{HttpProbe, LivenessProbe, ProbeOutcome, ProbeReport};

/// Final classification of a validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted,
    /// Failed the local format or metadata check; no probe was sent.
    Malformed,
    Rejected,
    RateLimited,
    Unreachable,
}

impl ValidationOutcome {
    /// Malformed and rejected count toward the invalidation threshold.
    pub fn is_hard_failure(self) -> bool {
        matches!(self, Self::Malformed | Self::Rejected)
    }

    /// Instantaneous health sample for this outcome.
    pub fn sample(self) -> u8 {
        match self {
            Self::Accepted => SAMPLE_ACCEPTED,
            Self::RateLimited => SAMPLE_RATE_LIMITED,
            Self::Unreachable => SAMPLE_TRANSIENT,
            Self::Malformed | Self::Rejected => SAMPLE_REJECTED,
        }
    }
}

impl From<ProbeOutcome> for ValidationOutcome {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Accepted => Self::Accepted,
            ProbeOutcome::Rejected => Self::Rejected,
            ProbeOutcome::RateLimited => Self::RateLimited,
            ProbeOutcome::Unreachable => Self::Unreachable,
        }
    }
}

/// What the provider said, minus anything sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResponseSummary {
    pub status_code: Option<u16>,
    pub latency_ms: Option<u64>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// The key authenticated (accepted or throttled).
    pub is_valid: bool,
    /// Instantaneous sample, not the smoothed score.
    pub health_score: u8,
    pub outcome: ValidationOutcome,
    pub message: String,
    pub provider_response: ProviderResponseSummary,
}

impl ValidationResult {
    fn malformed(message: String) -> Self {
        Self {
            is_valid: false,
            health_score: SAMPLE_REJECTED,
            outcome: ValidationOutcome::Malformed,
            message,
            provider_response: ProviderResponseSummary::default(),
        }
    }

    fn from_report(provider: Provider, report: ProbeReport) -> Self {
        let outcome = ValidationOutcome::from(report.outcome);
        let message = match outcome {
            ValidationOutcome::Accepted => format!("{provider} accepted the credential"),
            ValidationOutcome::Rejected => format!("{provider} rejected the credential"),
            ValidationOutcome::RateLimited => format!("{provider} is rate limiting the credential"),
            _ => format!("{provider} could not be reached: {}", report.detail),
        };
        Self {
            is_valid: matches!(
                outcome,
                ValidationOutcome::Accepted | ValidationOutcome::RateLimited
            ),
            health_score: outcome.sample(),
            outcome,
            message,
            provider_response: ProviderResponseSummary {
                status_code: report.status_code,
                latency_ms: Some(report.latency_ms),
                detail: report.detail,
            },
        }
    }
}

/// Checks credentials locally, probes the provider, and folds the outcome
/// into the stored health and status.
#[derive(Clone)]
pub struct Validator {
    probe: Arc<dyn LivenessProbe>,
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(probe: Arc<dyn LivenessProbe>, config: ValidatorConfig) -> Self {
        Self { probe, config }
    }

    /// Validator with an [`HttpProbe`] using `probe_timeout_secs`.
    pub fn http(config: ValidatorConfig) -> Result<Self, ByokError> {
        let probe = HttpProbe::new(Duration::from_secs(config.probe_timeout_secs))?;
        Ok(Self::new(Arc::new(probe), config))
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Schema and format checks only. No network.
    pub fn check_locally(
        &self,
        provider: Provider,
        secret: &SecretPayload,
        metadata: &Metadata,
    ) -> Result<(), String> {
        validate_metadata(provider, metadata).map_err(|e| e.to_string())?;
        check_for(provider).check_format(secret)
    }

    /// Validate a decrypted credential. Never fails: transport problems are
    /// reported in the result.
    pub async fn validate(
        &self,
        provider: Provider,
        secret: &SecretPayload,
        metadata: &Metadata,
    ) -> ValidationResult {
        if let Err(message) = self.check_locally(provider, secret, metadata) {
            debug!(%provider, %message, "credential failed local checks");
            return ValidationResult::malformed(message);
        }

        let base_url = metadata.get(BASE_URL).and_then(|v| v.as_text());
        let request = check_for(provider).probe_request(secret, base_url);
        let report = self.probe.probe(&request).await;
        if report.outcome == ProbeOutcome::Unreachable {
            warn!(%provider, detail = %report.detail, "provider probe failed");
        }
        ValidationResult::from_report(provider, report)
    }

    /// Fold `result` into the stored credential and audit it.
    ///
    /// The transition is decided against the row as stored when the update
    /// commits, not against `credential`, which may be stale after a slow
    /// probe. Hard failures increment the consecutive-failure counter and
    /// move the credential to `invalid` at the threshold. Any authenticated
    /// outcome resets the counter; acceptance restores `invalid` or
    /// `rate_limited` to `active`. Rate limiting moves an active credential
    /// to `rate_limited`. Revoked and expired credentials keep their status.
    pub async fn apply(
        &self,
        store: &Arc<dyn CredentialStore>,
        credential: &Credential,
        result: &ValidationResult,
    ) -> Result<Credential, ByokError> {
        let outcome = result.outcome;
        let authenticated = result.is_valid;
        let sample = result.health_score;
        let alpha = self.config.health_alpha;
        let max_failures = self.config.max_consecutive_failures;
        let validated_at = Utc::now();

        let (before, updated) = store
            .update_with(
                &credential.id,
                Box::new(move |current: &Credential| {
                    let failures = if outcome.is_hard_failure() {
                        current.validation_failures.saturating_add(1)
                    } else if authenticated {
                        0
                    } else {
                        current.validation_failures
                    };
                    let status = next_status(current.status, outcome, failures, max_failures);
                    Ok(CredentialUpdate {
                        health_score: Some(health::next_score(current.health_score, sample, alpha)),
                        validation_failures: Some(failures),
                        last_validated_at: Some(validated_at),
                        status: (status != current.status).then_some(status),
                        ..Default::default()
                    })
                }),
            )
            .await?;

        if updated.status != before.status {
            info!(
                credential_id = %updated.id,
                tenant_id = %updated.tenant_id,
                from = %before.status,
                to = %updated.status,
                "credential status changed by validation"
            );
        }

        AuditTrail::new(store.clone())
            .credential_event(
                &updated.tenant_id,
                &updated.id,
                AuditEvent::Validate,
                result.is_valid,
                format!("{:?}: {}", result.outcome, result.message),
            )
            .await;

        Ok(updated)
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn next_status(
    current: CredentialStatus,
    outcome: ValidationOutcome,
    failures: u32,
    max_failures: u32,
) -> CredentialStatus {
    use CredentialStatus::*;
    match (current, outcome) {
        (Revoked | Expired, _) => current,
        (Active | RateLimited, o) if o.is_hard_failure() && failures >= max_failures => Invalid,
        (Invalid | RateLimited, ValidationOutcome::Accepted) => Active,
        (Active, ValidationOutcome::RateLimited) => RateLimited,
        _ => current,
    }
}
