// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate ordering per selection strategy.

use std::cmp::Ordering;
use std::collections::HashMap;

use byok_core::schema::COST_PER_REQUEST;
use byok_core::{ByokError, Credential, CredentialStore, SelectionStrategy};
use chrono::{DateTime, TimeDelta, Utc};

/// Reorder `candidates` for `strategy`. Sorting is stable, so ties keep the
/// incoming order.
pub async fn order_candidates(
    store: &dyn CredentialStore,
    mut candidates: Vec<Credential>,
    strategy: SelectionStrategy,
    least_used_window_secs: u64,
    now: DateTime<Utc>,
) -> Result<Vec<Credential>, ByokError> {
    match strategy {
        SelectionStrategy::Sequential => {}
        SelectionStrategy::LeastUsed => {
            let since = window_start(now, least_used_window_secs)?;
            let counts = store.usage_counts_since(&ids(&candidates), since).await?;
            sort_least_used(&mut candidates, &counts);
        }
        SelectionStrategy::CostOptimize => {
            let unpriced: Vec<String> = candidates
                .iter()
                .filter(|c| declared_cost(c).is_none())
                .map(|c| c.id.clone())
                .collect();
            let averages = if unpriced.is_empty() {
                HashMap::new()
            } else {
                store.average_cost(&unpriced).await?
            };
            sort_cheapest(&mut candidates, &averages);
        }
    }
    Ok(candidates)
}

/// `now - window_secs`, or a configuration error when that is not a
/// representable instant.
fn window_start(now: DateTime<Utc>, window_secs: u64) -> Result<DateTime<Utc>, ByokError> {
    i64::try_from(window_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            ByokError::Configuration(format!(
                "least_used window of {window_secs}s is out of range"
            ))
        })
}

fn ids(candidates: &[Credential]) -> Vec<String> {
    candidates.iter().map(|c| c.id.clone()).collect()
}

fn declared_cost(credential: &Credential) -> Option<f64> {
    credential
        .metadata
        .get(COST_PER_REQUEST)
        .and_then(|v| v.as_number())
}

fn sort_least_used(candidates: &mut [Credential], counts: &HashMap<String, u64>) {
    candidates.sort_by_key(|c| counts.get(&c.id).copied().unwrap_or(0));
}

/// Declared cost first, then observed average; unknown sorts last.
fn sort_cheapest(candidates: &mut [Credential], averages: &HashMap<String, f64>) {
    let cost = |c: &Credential| declared_cost(c).or_else(|| averages.get(&c.id).copied());
    candidates.sort_by(|a, b| match (cost(a), cost(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
