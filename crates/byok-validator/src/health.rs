// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health score samples and exponential smoothing.

/// Sample for a probe the provider accepted.
pub const SAMPLE_ACCEPTED: u8 = 100;
/// Sample for an authenticated but throttled probe.
pub const SAMPLE_RATE_LIMITED: u8 = 50;
/// Sample for a timeout, network error, or 5xx.
pub const SAMPLE_TRANSIENT: u8 = 25;
/// Sample for a rejected or malformed credential.
pub const SAMPLE_REJECTED: u8 = 0;

/// Float noise below this is ignored when rounding.
const EPSILON: f64 = 1e-9;

/// `alpha * sample + (1 - alpha) * previous`, rounded toward the sample and
/// clamped to 0..=100. Rounding toward the sample lets repeated identical
/// samples converge onto it exactly.
pub fn next_score(previous: u8, sample: u8, alpha: f64) -> u8 {
    let alpha = alpha.clamp(0.0, 1.0);
    let next = alpha * f64::from(sample) + (1.0 - alpha) * f64::from(previous);
    let rounded = if sample < previous {
        (next + EPSILON).floor()
    } else {
        (next - EPSILON).ceil()
    };
    rounded.clamp(0.0, 100.0) as u8
}
