// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider key shape checks and probe requests.
//!
//! One unit struct per provider, selected by an exhaustive match in
//! [`check_for`]. Adding a provider is a compile error until it has a check.

use std::sync::LazyLock;

use base64::Engine;
use byok_core::{Provider, SecretPayload};
use regex::Regex;
use zeroize::Zeroizing;

static OPENAI_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9_\-]{20,}$").unwrap());
static ANTHROPIC_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-ant-[A-Za-z0-9_\-]{20,}$").unwrap());
static GEMINI_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AIza[0-9A-Za-z_\-]{35}$").unwrap());
static DEEPGRAM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap());
static ELEVENLABS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9a-fA-F]{32}|sk_[0-9a-fA-F]{48})$").unwrap());
static TWILIO_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").unwrap());
static TWILIO_SID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AC[0-9a-fA-F]{32}$").unwrap());

/// Secret field holding a Twilio account SID.
pub const TWILIO_ACCOUNT_SID: &str = "account_sid";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One request header. The value is zeroed on drop and never printed.
pub struct ProbeHeader {
    pub name: &'static str,
    pub value: Zeroizing<String>,
}

impl ProbeHeader {
    fn new(name: &'static str, value: String) -> Self {
        Self {
            name,
            value: Zeroizing::new(value),
        }
    }
}

/// An authenticated GET against the provider's cheapest read endpoint.
pub struct ProbeRequest {
    pub url: String,
    pub headers: Vec<ProbeHeader>,
}

impl std::fmt::Debug for ProbeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<String> = self
            .headers
            .iter()
            .map(|h| format!("{}: [REDACTED]", h.name))
            .collect();
        f.debug_struct("ProbeRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .finish()
    }
}

/// Local validation plus the liveness request for one provider.
pub trait ProviderCheck: Send + Sync {
    /// Production API root used when metadata carries no `base_url`.
    fn default_base_url(&self) -> &'static str;

    /// Fast shape check. The error text never contains the secret.
    fn check_format(&self, secret: &SecretPayload) -> Result<(), String>;

    /// Build the probe request. `base_url` overrides the default API root.
    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest;
}

fn root<'a>(check: &'a dyn ProviderCheck, base_url: Option<&'a str>) -> &'a str {
    base_url
        .unwrap_or_else(|| check.default_base_url())
        .trim_end_matches('/')
}

fn require(pattern: &Regex, value: &str, what: &str) -> Result<(), String> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(format!("{what} has an unexpected format"))
    }
}

pub struct OpenAiCheck;
pub struct AnthropicCheck;
pub struct GeminiCheck;
pub struct DeepgramCheck;
pub struct ElevenLabsCheck;
pub struct TwilioCheck;

impl ProviderCheck for OpenAiCheck {
    fn default_base_url(&self) -> &'static str {
        "https://api.openai.com"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&OPENAI_KEY, secret.api_key(), "OpenAI API key")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            url: format!("{}/v1/models", root(self, base_url)),
            headers: vec![ProbeHeader::new(
                "authorization",
                format!("Bearer {}", secret.api_key()),
            )],
        }
    }
}

impl ProviderCheck for AnthropicCheck {
    fn default_base_url(&self) -> &'static str {
        "https://api.anthropic.com"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&ANTHROPIC_KEY, secret.api_key(), "Anthropic API key")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            url: format!("{}/v1/models", root(self, base_url)),
            headers: vec![
                ProbeHeader::new("x-api-key", secret.api_key().to_string()),
                ProbeHeader::new("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
        }
    }
}

impl ProviderCheck for GeminiCheck {
    fn default_base_url(&self) -> &'static str {
        "https://generativelanguage.googleapis.com"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&GEMINI_KEY, secret.api_key(), "Gemini API key")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            url: format!("{}/v1beta/models", root(self, base_url)),
            headers: vec![ProbeHeader::new(
                "x-goog-api-key",
                secret.api_key().to_string(),
            )],
        }
    }
}

impl ProviderCheck for DeepgramCheck {
    fn default_base_url(&self) -> &'static str {
        "https://api.deepgram.com"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&DEEPGRAM_KEY, secret.api_key(), "Deepgram API key")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            url: format!("{}/v1/projects", root(self, base_url)),
            headers: vec![ProbeHeader::new(
                "authorization",
                format!("Token {}", secret.api_key()),
            )],
        }
    }
}

impl ProviderCheck for ElevenLabsCheck {
    fn default_base_url(&self) -> &'static str {
        "https://api.elevenlabs.io"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&ELEVENLABS_KEY, secret.api_key(), "ElevenLabs API key")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        ProbeRequest {
            url: format!("{}/v1/user", root(self, base_url)),
            headers: vec![ProbeHeader::new(
                "xi-api-key",
                secret.api_key().to_string(),
            )],
        }
    }
}

impl ProviderCheck for TwilioCheck {
    fn default_base_url(&self) -> &'static str {
        "https://api.twilio.com"
    }

    fn check_format(&self, secret: &SecretPayload) -> Result<(), String> {
        require(&TWILIO_TOKEN, secret.api_key(), "Twilio auth token")?;
        let sid = secret
            .field(TWILIO_ACCOUNT_SID)
            .ok_or_else(|| format!("Twilio credentials need the `{TWILIO_ACCOUNT_SID}` field"))?;
        require(&TWILIO_SID, sid, "Twilio account SID")
    }

    fn probe_request(&self, secret: &SecretPayload, base_url: Option<&str>) -> ProbeRequest {
        let sid = secret.field(TWILIO_ACCOUNT_SID).unwrap_or_default();
        let basic = Zeroizing::new(format!("{sid}:{}", secret.api_key()));
        let encoded = base64::engine::general_purpose::STANDARD.encode(basic.as_bytes());
        ProbeRequest {
            url: format!("{}/2010-04-01/Accounts/{sid}.json", root(self, base_url)),
            headers: vec![ProbeHeader::new("authorization", format!("Basic {encoded}"))],
        }
    }
}

/// The check for `provider`.
pub fn check_for(provider: Provider) -> &'static dyn ProviderCheck {
    match provider {
        Provider::OpenAi => &OpenAiCheck,
        Provider::Anthropic => &AnthropicCheck,
        Provider::Gemini => &GeminiCheck,
        Provider::Deepgram => &DeepgramCheck,
        Provider::ElevenLabs => &ElevenLabsCheck,
        Provider::Twilio => &TwilioCheck,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> SecretPayload {
        SecretPayload::new(s)
    }

    #[test]
    fn openai_format() {
        let check = check_for(Provider::OpenAi);
        assert!(check.check_format(&key("sk-abcdefghijklmnopqrstuvwx")).is_ok());
        assert!(check.check_format(&key("sk-proj-abcdefghijklmnopqrstu")).is_ok());
        assert!(check.check_format(&key("sk-short")).is_err());
        assert!(check.check_format(&key("pk-abcdefghijklmnopqrstuvwx")).is_err());
    }

    #[test]
    fn anthropic_format() {
        let check = check_for(Provider::Anthropic);
        assert!(check.check_format(&key("sk-ant-REDACTED")).is_ok());
        assert!(check.check_format(&key("sk-abcdefghijklmnopqrstuvwx")).is_err());
    }

    #[test]
    fn gemini_format() {
        let check = check_for(Provider::Gemini);
        let good = format!("AIza{}", "x".repeat(35));
        assert!(check.check_format(&key(&good)).is_ok());
        assert!(check.check_format(&key("AIzaTooShort")).is_err());
    }

    #[test]
    fn deepgram_and_elevenlabs_formats() {
        let hex40 = "a1".repeat(20);
        assert!(check_for(Provider::Deepgram).check_format(&key(&hex40)).is_ok());
        assert!(check_for(Provider::Deepgram).check_format(&key("xyz")).is_err());

        let eleven = check_for(Provider::ElevenLabs);
        assert!(eleven.check_format(&key(&"b2".repeat(16))).is_ok());
        assert!(eleven.check_format(&key(&format!("sk_{}", "c3".repeat(24)))).is_ok());
        assert!(eleven.check_format(&key(&hex40)).is_err());
    }

    #[test]
    fn twilio_needs_account_sid() {
        let check = check_for(Provider::Twilio);
        let token = "d4".repeat(16);
        assert!(check.check_format(&key(&token)).is_err());

        let sid = format!("AC{}", "e5".repeat(16));
        let payload = SecretPayload::new(token.clone()).with_field(TWILIO_ACCOUNT_SID, sid.clone());
        assert!(check.check_format(&payload).is_ok());

        let request = check.probe_request(&payload, None);
        assert_eq!(
            request.url,
            format!("https://api.twilio.com/2010-04-01/Accounts/{sid}.json")
        );
        assert!(request.headers[0].value.starts_with("Basic "));
    }

    #[test]
    fn format_errors_never_echo_the_secret() {
        let err = check_for(Provider::OpenAi)
            .check_format(&key("sk-leaky"))
            .unwrap_err();
        assert!(!err.contains("leaky"));
    }

    #[test]
    fn base_url_override_and_trailing_slash() {
        let request =
            check_for(Provider::OpenAi).probe_request(&key("sk-x"), Some("http://127.0.0.1:9/"));
        assert_eq!(request.url, "http://127.0.0.1:9/v1/models");
    }

    #[test]
    fn probe_request_debug_is_redacted() {
        let request = check_for(Provider::Anthropic)
            .probe_request(&key("sk-ant-REDACTED"), None);
        let out = format!("{request:?}");
        assert!(out.contains("x-api-key: [REDACTED]"));
        assert!(!out.contains("secretsecret"));
    }
}
