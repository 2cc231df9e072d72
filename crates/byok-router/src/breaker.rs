// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-credential circuit breakers.
//!
//! Entries live in a [`DashMap`], so a transition locks only the shard that
//! holds one credential. No method awaits; callers do store I/O after the
//! entry guard is released.

use std::time::{Duration, Instant};

use byok_config::model::RouterConfig;
use dashmap::DashMap;
use strum::Display;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Whether a caller may use a credential right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The caller holds the single half-open trial and must report its outcome.
    Trial,
    Rejected,
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    /// Time until an open breaker admits a trial, or until an unreported
    /// trial is released.
    pub retry_in: Option<Duration>,
}

#[derive(Debug)]
struct BreakerEntry {
    state: BreakerState,
    failure_count: u32,
    /// Open: when the cooldown ends. Half-open: when an unreported trial lapses.
    deadline: Option<Instant>,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            deadline: None,
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreakers {
    entries: DashMap<String, BreakerEntry>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreakers {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.cooldown_secs),
        )
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn admit(&self, credential_id: &str) -> Admission {
        self.admit_at(credential_id, Instant::now())
    }

    /// Decide admission at `now`, claiming the half-open trial when the
    /// cooldown has elapsed.
    pub fn admit_at(&self, credential_id: &str, now: Instant) -> Admission {
        let Some(mut entry) = self.entries.get_mut(credential_id) else {
            return Admission::Allowed;
        };
        match entry.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open | BreakerState::HalfOpen => {
                if entry.deadline.is_some_and(|at| now < at) {
                    return Admission::Rejected;
                }
                if entry.state == BreakerState::HalfOpen {
                    debug!(credential_id, "releasing unreported half-open trial");
                }
                entry.state = BreakerState::HalfOpen;
                entry.deadline = Some(now + self.cooldown);
                Admission::Trial
            }
        }
    }

    /// Close the breaker and reset its failure count.
    pub fn record_success(&self, credential_id: &str) {
        if let Some((_, entry)) = self.entries.remove(credential_id)
            && entry.state != BreakerState::Closed
        {
            info!(credential_id, from = %entry.state, "circuit breaker closed");
        }
    }

    pub fn record_failure(&self, credential_id: &str) -> bool {
        self.record_failure_at(credential_id, Instant::now())
    }

    /// Count a failure at `now`. Returns `true` when this failure opened the
    /// breaker.
    pub fn record_failure_at(&self, credential_id: &str, now: Instant) -> bool {
        let mut entry = self.entries.entry(credential_id.to_string()).or_default();
        entry.failure_count = entry.failure_count.saturating_add(1);
        let opens = match entry.state {
            BreakerState::Closed => entry.failure_count >= self.threshold,
            BreakerState::HalfOpen => true,
            BreakerState::Open => false,
        };
        if opens {
            entry.state = BreakerState::Open;
            entry.deadline = Some(now + self.cooldown);
            info!(
                credential_id,
                failures = entry.failure_count,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker opened"
            );
        }
        opens
    }

    pub fn snapshot(&self, credential_id: &str) -> BreakerSnapshot {
        self.snapshot_at(credential_id, Instant::now())
    }

    pub fn snapshot_at(&self, credential_id: &str, now: Instant) -> BreakerSnapshot {
        match self.entries.get(credential_id) {
            Some(entry) => BreakerSnapshot {
                state: entry.state,
                failure_count: entry.failure_count,
                retry_in: entry.deadline.map(|at| at.saturating_duration_since(now)),
            },
            None => BreakerSnapshot {
                state: BreakerState::Closed,
                failure_count: 0,
                retry_in: None,
            },
        }
    }

    /// Drop all state for a credential, e.g. after it is deleted.
    pub fn forget(&self, credential_id: &str) {
        self.entries.remove(credential_id);
    }

    /// Number of credentials with breaker state.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    fn breakers() -> CircuitBreakers {
        CircuitBreakers::new(5, COOLDOWN)
    }

    fn trip(b: &CircuitBreakers, id: &str, now: Instant) {
        for i in 0..5 {
            let opened = b.record_failure_at(id, now);
            assert_eq!(opened, i == 4);
        }
    }

    #[test]
    fn unknown_credential_is_allowed() {
        let b = breakers();
        assert_eq!(b.admit("c1"), Admission::Allowed);
        assert_eq!(b.snapshot("c1").state, BreakerState::Closed);
    }

    #[test]
    fn opens_after_threshold_and_rejects_during_cooldown() {
        let b = breakers();
        let t0 = Instant::now();
        for _ in 0..4 {
            assert!(!b.record_failure_at("c1", t0));
        }
        assert_eq!(b.admit_at("c1", t0), Admission::Allowed);
        assert!(b.record_failure_at("c1", t0));

        assert_eq!(b.admit_at("c1", t0), Admission::Rejected);
        assert_eq!(
            b.admit_at("c1", t0 + Duration::from_secs(59)),
            Admission::Rejected
        );
        let snap = b.snapshot_at("c1", t0);
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.failure_count, 5);
        assert_eq!(snap.retry_in, Some(COOLDOWN));
    }

    #[test]
    fn exactly_one_trial_after_cooldown() {
        let b = breakers();
        let t0 = Instant::now();
        trip(&b, "c1", t0);

        let later = t0 + COOLDOWN;
        assert_eq!(b.admit_at("c1", later), Admission::Trial);
        assert_eq!(b.admit_at("c1", later), Admission::Rejected);
        assert_eq!(b.snapshot_at("c1", later).state, BreakerState::HalfOpen);
    }

    #[test]
    fn trial_success_closes() {
        let b = breakers();
        let t0 = Instant::now();
        trip(&b, "c1", t0);
        assert_eq!(b.admit_at("c1", t0 + COOLDOWN), Admission::Trial);

        b.record_success("c1");
        let snap = b.snapshot("c1");
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert_eq!(b.admit("c1"), Admission::Allowed);
    }

    #[test]
    fn trial_failure_reopens_with_fresh_cooldown() {
        let b = breakers();
        let t0 = Instant::now();
        trip(&b, "c1", t0);
        let t1 = t0 + COOLDOWN;
        assert_eq!(b.admit_at("c1", t1), Admission::Trial);

        assert!(b.record_failure_at("c1", t1));
        assert_eq!(
            b.admit_at("c1", t1 + Duration::from_secs(30)),
            Admission::Rejected
        );
        assert_eq!(b.admit_at("c1", t1 + COOLDOWN), Admission::Trial);
    }

    #[test]
    fn abandoned_trial_is_released_after_one_cooldown() {
        let b = breakers();
        let t0 = Instant::now();
        trip(&b, "c1", t0);
        let t1 = t0 + COOLDOWN;
        assert_eq!(b.admit_at("c1", t1), Admission::Trial);
        assert_eq!(b.admit_at("c1", t1 + Duration::from_secs(1)), Admission::Rejected);
        assert_eq!(b.admit_at("c1", t1 + COOLDOWN), Admission::Trial);
    }

    #[test]
    fn success_while_closed_resets_count() {
        let b = breakers();
        let t0 = Instant::now();
        for _ in 0..4 {
            b.record_failure_at("c1", t0);
        }
        b.record_success("c1");
        assert!(!b.record_failure_at("c1", t0));
        assert_eq!(b.snapshot("c1").failure_count, 1);
    }

    #[test]
    fn breakers_are_independent() {
        let b = breakers();
        trip(&b, "c1", Instant::now());
        assert_eq!(b.admit("c1"), Admission::Rejected);
        assert_eq!(b.admit("c2"), Admission::Allowed);

        b.forget("c1");
        assert_eq!(b.admit("c1"), Admission::Allowed);
    }

    #[test]
    fn concurrent_failures_open_once() {
        let b = std::sync::Arc::new(breakers());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let b = b.clone();
                std::thread::spawn(move || b.record_failure("c1"))
            })
            .collect();
        let opened = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o)
            .count();
        assert_eq!(opened, 1);
        assert_eq!(b.snapshot("c1").failure_count, 10);
    }
}
