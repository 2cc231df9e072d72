// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential validation for the BYOK vault.
//!
//! A local format check per provider, an authenticated liveness probe, and
//! an exponentially smoothed health score that drives status transitions.

pub mod checks;
pub mod health;
pub mod probe;
pub mod validator;

pub use checks::{ProbeRequest, ProviderCheck, check_for};
pub use probe::{HttpProbe, LivenessProbe, ProbeOutcome, ProbeReport};
pub use validator::{ProviderResponseSummary, ValidationOutcome, ValidationResult, Validator};
