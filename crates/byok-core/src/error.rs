// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the BYOK credential vault.

use thiserror::Error;

use crate::types::{Environment, Provider};

/// The primary error type used across the vault crates.
#[derive(Debug, Error)]
pub enum ByokError {
    /// Key derivation or authenticated encryption failed (entropy source, cipher setup).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authenticated decryption failed: wrong tenant, corrupted bundle, or tampering.
    ///
    /// Never downgraded to a warning. No partial plaintext accompanies this error.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// A credential with the same secret hash already exists for the tenant.
    #[error("duplicate credential for tenant {tenant_id} ({provider})")]
    DuplicateCredential { tenant_id: String, provider: Provider },

    /// No credential exists with the given id.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// No fallback chain exists for the (tenant, provider, environment) triple.
    #[error("fallback chain not found: {tenant_id}/{provider}/{environment}")]
    ChainNotFound {
        tenant_id: String,
        provider: Provider,
        environment: Environment,
    },

    /// Every candidate in the chain is open, inactive, or undecryptable.
    #[error("no available credential for {tenant_id}/{provider}/{environment}")]
    NoAvailableCredential {
        tenant_id: String,
        provider: Provider,
        environment: Environment,
    },

    /// Input rejected at the boundary (metadata schema, key shape, capability set).
    #[error("validation error: {0}")]
    Validation(String),

    /// Weak master secret, malformed chain, or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ByokError {
    /// Wrap any backend error as [`ByokError::Storage`].
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ByokError::Storage {
            source: Box::new(err),
        }
    }
}
