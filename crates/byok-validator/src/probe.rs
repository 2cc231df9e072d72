// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness probes against provider APIs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use byok_core::ByokError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::checks::ProbeRequest;

/// How the provider answered a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx: the key authenticated.
    Accepted,
    /// 401/403: the provider refused the key.
    Rejected,
    /// 429: authenticated but throttled.
    RateLimited,
    /// Timeout, connection error, 5xx, or any other status.
    Unreachable,
}

/// Result of one probe. Never carries response bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub detail: String,
}

impl ProbeReport {
    /// Classify an HTTP status.
    pub fn from_status(status: u16, latency_ms: u64) -> Self {
        let outcome = match status {
            200..=299 => ProbeOutcome::Accepted,
            401 | 403 => ProbeOutcome::Rejected,
            429 => ProbeOutcome::RateLimited,
            _ => ProbeOutcome::Unreachable,
        };
        Self {
            outcome,
            status_code: Some(status),
            latency_ms,
            detail: format!("HTTP {status}"),
        }
    }

    pub fn unreachable(detail: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            outcome: ProbeOutcome::Unreachable,
            status_code: None,
            latency_ms,
            detail: detail.into(),
        }
    }
}

/// Sends a probe request. Transport failures come back as
/// [`ProbeOutcome::Unreachable`], never as errors.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> ProbeReport;
}

/// `reqwest`-backed probe with a per-request timeout.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ByokError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("byok-validator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ByokError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn header_map(request: &ProbeRequest) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    for header in &request.headers {
        let name = HeaderName::from_static(header.name);
        let mut value = HeaderValue::from_str(&header.value)
            .map_err(|_| format!("header `{}` has invalid characters", header.name))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, request: &ProbeRequest) -> ProbeReport {
        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let headers = match header_map(request) {
            Ok(headers) => headers,
            Err(detail) => return ProbeReport::unreachable(detail, 0),
        };

        match self.client.get(&request.url).headers(headers).send().await {
            Ok(response) => {
                let report = ProbeReport::from_status(response.status().as_u16(), elapsed(started));
                debug!(
                    url = %request.url,
                    status = response.status().as_u16(),
                    latency_ms = report.latency_ms,
                    "probe completed"
                );
                report
            }
            Err(e) => {
                let detail = if e.is_timeout() {
                    "probe timed out".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    "request failed".to_string()
                };
                warn!(url = %request.url, detail = %detail, "probe failed");
                ProbeReport::unreachable(detail, elapsed(started))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::check_for;
    use byok_core::{Provider, SecretPayload};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "sk-abcdefghijklmnopqrstuvwx";

    fn openai_request(base: &str) -> ProbeRequest {
        check_for(Provider::OpenAi).probe_request(&SecretPayload::new(KEY), Some(base))
    }

    #[test]
    fn status_classification() {
        assert_eq!(ProbeReport::from_status(200, 1).outcome, ProbeOutcome::Accepted);
        assert_eq!(ProbeReport::from_status(401, 1).outcome, ProbeOutcome::Rejected);
        assert_eq!(ProbeReport::from_status(403, 1).outcome, ProbeOutcome::Rejected);
        assert_eq!(ProbeReport::from_status(429, 1).outcome, ProbeOutcome::RateLimited);
        assert_eq!(ProbeReport::from_status(503, 1).outcome, ProbeOutcome::Unreachable);
        assert_eq!(ProbeReport::from_status(404, 1).outcome, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn accepted_with_bearer_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", format!("Bearer {KEY}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":[]}"))
            .expect(1)
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        let report = probe.probe(&openai_request(&server.uri())).await;
        assert_eq!(report.outcome, ProbeOutcome::Accepted);
        assert_eq!(report.status_code, Some(200));
    }

    #[tokio::test]
    async fn rejected_and_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
        let request = openai_request(&server.uri());
        assert_eq!(probe.probe(&request).await.outcome, ProbeOutcome::Rejected);
        assert_eq!(probe.probe(&request).await.outcome, ProbeOutcome::RateLimited);
    }

    #[tokio::test]
    async fn timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let probe = HttpProbe::new(Duration::from_millis(50)).unwrap();
        let report = probe.probe(&openai_request(&server.uri())).await;
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert_eq!(report.status_code, None);
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let probe = HttpProbe::new(Duration::from_secs(1)).unwrap();
        let report = probe.probe(&openai_request("http://127.0.0.1:9")).await;
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
    }
}
