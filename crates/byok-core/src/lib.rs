// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the BYOK credential vault.
//!
//! Provides the error type, domain types, typed metadata schemas, the
//! zeroizing [`SecretPayload`], and the [`CredentialStore`] trait that every
//! persistence backend implements.

pub mod audit;
pub mod error;
pub mod schema;
pub mod secret;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use audit::AuditTrail;
pub use error::ByokError;
pub use schema::{Metadata, MetadataKind, MetadataValue};
pub use secret::SecretPayload;
pub use traits::CredentialStore;
pub use types::{
    AuditEntry, AuditEvent, Capability, ChainUpdate, Credential, CredentialFilter,
    CredentialStatus, CredentialUpdate, EncryptedBundle, Environment, FallbackChain, Provider,
    SecretUpdate, SelectionStrategy, UsageMetrics, UsageRecord,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byok_error_has_all_variants() {
        let _enc = ByokError::Encryption("test".into());
        let _dec = ByokError::Decryption("test".into());
        let _dup = ByokError::DuplicateCredential {
            tenant_id: "t1".into(),
            provider: Provider::OpenAi,
        };
        let _missing = ByokError::CredentialNotFound("c1".into());
        let _chain = ByokError::ChainNotFound {
            tenant_id: "t1".into(),
            provider: Provider::OpenAi,
            environment: Environment::Production,
        };
        let _none = ByokError::NoAvailableCredential {
            tenant_id: "t1".into(),
            provider: Provider::OpenAi,
            environment: Environment::Production,
        };
        let _validation = ByokError::Validation("test".into());
        let _config = ByokError::Configuration("test".into());
        let _storage = ByokError::storage(std::io::Error::other("test"));
        let _internal = ByokError::Internal("test".into());
    }

    #[test]
    fn no_available_credential_message_names_the_triple() {
        let err = ByokError::NoAvailableCredential {
            tenant_id: "t1".into(),
            provider: Provider::Anthropic,
            environment: Environment::Staging,
        };
        assert_eq!(
            err.to_string(),
            "no available credential for t1/anthropic/staging"
        );
    }

    #[test]
    fn store_trait_is_object_safe() {
        fn _assert_dyn(_: &dyn CredentialStore) {}
    }
}
