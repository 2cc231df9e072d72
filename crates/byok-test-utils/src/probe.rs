// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted liveness probe for deterministic validation tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use byok_validator::{LivenessProbe, ProbeReport, ProbeRequest};
use tokio::sync::Mutex;

/// A probe that answers with pre-configured HTTP status codes.
///
/// Statuses are popped from a FIFO queue. When the queue is empty, every
/// probe answers 200. Request URLs are captured for assertions.
#[derive(Default)]
pub struct ScriptedProbe {
    statuses: Arc<Mutex<VecDeque<u16>>>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: Arc::new(Mutex::new(statuses.into_iter().collect())),
            seen: Arc::default(),
        }
    }

    /// Queue another status.
    pub async fn push_status(&self, status: u16) {
        self.statuses.lock().await.push_back(status);
    }

    /// URLs probed so far, oldest first.
    pub async fn seen_urls(&self) -> Vec<String> {
        self.seen.lock().await.clone()
    }

    pub async fn probe_count(&self) -> usize {
        self.seen.lock().await.len()
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    async fn probe(&self, request: &ProbeRequest) -> ProbeReport {
        self.seen.lock().await.push(request.url.clone());
        let status = self.statuses.lock().await.pop_front().unwrap_or(200);
        ProbeReport::from_status(status, 1)
    }
}
