// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-tenant BYOK credential vault.
//!
//! [`CredentialVault`] ties together the store, the per-tenant cipher, the
//! validator, and the fallback router. Secrets are encrypted before they
//! reach storage and only decrypted in-process, on selection or reveal.

pub mod housekeeping;
pub mod rotation;
pub mod vault;

pub use housekeeping::HousekeepingReport;
pub use rotation::RotationReport;
pub use vault::{CredentialChanges, CredentialVault, NewCredential};
