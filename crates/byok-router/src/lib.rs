// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential selection for the BYOK vault.
//!
//! - [`CircuitBreakers`]: per-credential closed/open/half-open state in a
//!   sharded map
//! - [`FallbackRouter`]: walks a tenant's fallback chain in strategy order
//!   and returns the first admitted, decryptable credential

pub mod breaker;
pub mod router;
pub mod strategy;

pub use breaker::{Admission, BreakerSnapshot, BreakerState, CircuitBreakers};
pub use router::{FallbackRouter, SelectedCredential};
