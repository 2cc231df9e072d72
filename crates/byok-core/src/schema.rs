// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed per-provider metadata and capability schemas.
//!
//! Metadata is a string-keyed map of scalar values. Each provider declares
//! which keys it accepts and what kind each value must be; anything else is
//! rejected at the boundary before it reaches the store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ByokError;
use crate::types::{Capability, Provider};

/// Metadata key holding the per-request cost used by `cost_optimize` chains.
pub const COST_PER_REQUEST: &str = "cost_per_request";

/// Metadata key overriding the provider's default probe endpoint.
pub const BASE_URL: &str = "base_url";

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl MetadataValue {
    pub fn kind(&self) -> MetadataKind {
        match self {
            MetadataValue::Flag(_) => MetadataKind::Flag,
            MetadataValue::Number(_) => MetadataKind::Number,
            MetadataValue::Text(_) => MetadataKind::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Flag(value)
    }
}

/// Expected kind of a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Flag,
    Number,
    Text,
}

/// Credential metadata: string keys to scalar values.
pub type Metadata = BTreeMap<String, MetadataValue>;

const COMMON_KEYS: &[(&str, MetadataKind)] = &[
    (COST_PER_REQUEST, MetadataKind::Number),
    (BASE_URL, MetadataKind::Text),
];

/// Provider-specific keys accepted on top of the common ones.
fn provider_keys(provider: Provider) -> &'static [(&'static str, MetadataKind)] {
    match provider {
        Provider::OpenAi => &[
            ("organization", MetadataKind::Text),
            ("project", MetadataKind::Text),
            ("model", MetadataKind::Text),
        ],
        Provider::Anthropic => &[("model", MetadataKind::Text)],
        Provider::Gemini => &[("project", MetadataKind::Text), ("model", MetadataKind::Text)],
        Provider::Deepgram => &[("model", MetadataKind::Text)],
        Provider::ElevenLabs => &[("voice_id", MetadataKind::Text)],
        Provider::Twilio => &[("region", MetadataKind::Text)],
    }
}

/// Look up the declared kind of `key` for `provider`.
pub fn expected_kind(provider: Provider, key: &str) -> Option<MetadataKind> {
    COMMON_KEYS
        .iter()
        .chain(provider_keys(provider))
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
}

/// Reject unknown keys, kind mismatches, and negative or non-finite costs.
pub fn validate_metadata(provider: Provider, metadata: &Metadata) -> Result<(), ByokError> {
    for (key, value) in metadata {
        let expected = expected_kind(provider, key).ok_or_else(|| {
            ByokError::Validation(format!("metadata key `{key}` is not valid for {provider}"))
        })?;
        if value.kind() != expected {
            return Err(ByokError::Validation(format!(
                "metadata key `{key}` expects {expected:?}, got {:?}",
                value.kind()
            )));
        }
    }

    if let Some(cost) = metadata.get(COST_PER_REQUEST).and_then(MetadataValue::as_number)
        && (!cost.is_finite() || cost < 0.0)
    {
        return Err(ByokError::Validation(format!(
            "{COST_PER_REQUEST} must be a non-negative number, got {cost}"
        )));
    }

    Ok(())
}

/// Reject capabilities the provider cannot serve.
pub fn validate_capabilities(
    provider: Provider,
    capabilities: &BTreeSet<Capability>,
) -> Result<(), ByokError> {
    let supported = provider.supported_capabilities();
    for capability in capabilities {
        if !supported.contains(capability) {
            return Err(ByokError::Validation(format!(
                "{provider} does not support capability `{capability}`"
            )));
        }
    }
    Ok(())
}

/// An empty capability set means "everything the provider supports".
pub fn effective_capabilities(
    provider: Provider,
    capabilities: &BTreeSet<Capability>,
) -> BTreeSet<Capability> {
    if capabilities.is_empty() {
        provider.supported_capabilities().iter().copied().collect()
    } else {
        capabilities.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn common_keys_accepted_for_every_provider() {
        let m = meta(&[
            (COST_PER_REQUEST, 0.002.into()),
            (BASE_URL, "https://proxy.internal".into()),
        ]);
        assert!(validate_metadata(Provider::Twilio, &m).is_ok());
        assert!(validate_metadata(Provider::Anthropic, &m).is_ok());
    }

    #[test]
    fn provider_specific_key_rejected_elsewhere() {
        let m = meta(&[("voice_id", "rachel".into())]);
        assert!(validate_metadata(Provider::ElevenLabs, &m).is_ok());
        let err = validate_metadata(Provider::OpenAi, &m).unwrap_err();
        assert!(err.to_string().contains("voice_id"));
    }

    #[test]
    fn kind_mismatch_rejected() {
        let m = meta(&[(COST_PER_REQUEST, "cheap".into())]);
        assert!(matches!(
            validate_metadata(Provider::Gemini, &m),
            Err(ByokError::Validation(_))
        ));
    }

    #[test]
    fn negative_cost_rejected() {
        let m = meta(&[(COST_PER_REQUEST, (-1.0).into())]);
        assert!(validate_metadata(Provider::Gemini, &m).is_err());
    }

    #[test]
    fn capability_subset_enforced() {
        let ok: BTreeSet<_> = [Capability::Chat].into_iter().collect();
        let bad: BTreeSet<_> = [Capability::Telephony].into_iter().collect();
        assert!(validate_capabilities(Provider::Anthropic, &ok).is_ok());
        assert!(validate_capabilities(Provider::Anthropic, &bad).is_err());
    }

    #[test]
    fn empty_capabilities_expand_to_supported() {
        let caps = effective_capabilities(Provider::Twilio, &BTreeSet::new());
        assert!(caps.contains(&Capability::Telephony));
        assert!(caps.contains(&Capability::Sms));
    }

    #[test]
    fn metadata_json_is_plain_scalars() {
        let m = meta(&[
            ("model", "gpt-4o".into()),
            (COST_PER_REQUEST, 0.5.into()),
        ]);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"cost_per_request":0.5,"model":"gpt-4o"}"#);
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
