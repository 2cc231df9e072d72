// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-scoped envelope encryption.
//!
//! Each encryption derives a fresh key from (master secret, tenant id, random
//! salt) and seals with AES-256-GCM under a random nonce. The tenant id is
//! also bound in as associated data, so a bundle moved to another tenant's
//! row cannot be opened.

use std::num::NonZeroU32;

use byok_config::model::{MIN_KDF_ITERATIONS, VaultConfig};
use byok_core::{ByokError, EncryptedBundle, SecretPayload};
use ring::aead::NONCE_LEN;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::{self, TAG_LEN};
use crate::kdf::{self, SALT_LEN};
use crate::master::MasterSecret;

/// Encrypts and decrypts secrets for any tenant under one master secret.
#[derive(Debug)]
pub struct TenantCipher {
    master: MasterSecret,
    iterations: NonZeroU32,
}

impl TenantCipher {
    /// Create a cipher. Fails if `iterations` is below 100,000.
    pub fn new(master: MasterSecret, iterations: u32) -> Result<Self, ByokError> {
        if iterations < MIN_KDF_ITERATIONS {
            return Err(ByokError::Configuration(format!(
                "kdf iterations must be at least {MIN_KDF_ITERATIONS}, got {iterations}"
            )));
        }
        let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
            ByokError::Configuration("kdf iterations must be non-zero".to_string())
        })?;
        Ok(Self { master, iterations })
    }

    /// Create a cipher using the iteration count from `[vault]`.
    pub fn from_config(master: MasterSecret, config: &VaultConfig) -> Result<Self, ByokError> {
        Self::new(master, config.kdf_iterations)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Encrypt raw bytes for `tenant_id`.
    pub fn encrypt(&self, plaintext: &[u8], tenant_id: &str) -> Result<EncryptedBundle, ByokError> {
        seal_for(&self.master, self.iterations, plaintext, tenant_id)
    }

    /// Decrypt a bundle for `tenant_id`. Any mismatch fails with `Decryption`.
    pub fn decrypt(
        &self,
        bundle: &EncryptedBundle,
        tenant_id: &str,
    ) -> Result<Zeroizing<Vec<u8>>, ByokError> {
        if bundle.salt.len() != SALT_LEN {
            return Err(ByokError::Decryption(format!(
                "corrupted salt (expected {SALT_LEN} bytes)"
            )));
        }
        let key = kdf::derive_key(&self.master, tenant_id, &bundle.salt, self.iterations);
        crypto::open(
            &key,
            &bundle.nonce,
            tenant_id.as_bytes(),
            &bundle.ciphertext,
            &bundle.auth_tag,
        )
    }

    /// Serialize and encrypt a secret payload.
    pub fn encrypt_payload(
        &self,
        payload: &SecretPayload,
        tenant_id: &str,
    ) -> Result<EncryptedBundle, ByokError> {
        let bytes = payload.to_bytes()?;
        self.encrypt(&bytes, tenant_id)
    }

    /// Decrypt and deserialize a secret payload.
    pub fn decrypt_payload(
        &self,
        bundle: &EncryptedBundle,
        tenant_id: &str,
    ) -> Result<SecretPayload, ByokError> {
        let bytes = self.decrypt(bundle, tenant_id)?;
        SecretPayload::from_bytes(&bytes)
    }

    /// Re-encrypt `bundle` under `new_master`, keeping the iteration count.
    /// The plaintext never leaves zeroizing memory.
    pub fn rotate(
        &self,
        bundle: &EncryptedBundle,
        tenant_id: &str,
        new_master: &MasterSecret,
    ) -> Result<EncryptedBundle, ByokError> {
        let plaintext = self.decrypt(bundle, tenant_id)?;
        let rotated = seal_for(new_master, self.iterations, &plaintext, tenant_id)?;
        debug!(tenant_id, "re-encrypted bundle under new master secret");
        Ok(rotated)
    }

    /// Consume this cipher and return one bound to `new_master`.
    pub fn with_master(self, new_master: MasterSecret) -> Self {
        Self {
            master: new_master,
            iterations: self.iterations,
        }
    }
}

fn seal_for(
    master: &MasterSecret,
    iterations: NonZeroU32,
    plaintext: &[u8],
    tenant_id: &str,
) -> Result<EncryptedBundle, ByokError> {
    let salt = kdf::generate_salt()?;
    let key = kdf::derive_key(master, tenant_id, &salt, iterations);
    let sealed = crypto::seal(&key, tenant_id.as_bytes(), plaintext)?;

    debug_assert_eq!(sealed.nonce.len(), NONCE_LEN);
    debug_assert_eq!(sealed.tag.len(), TAG_LEN);

    Ok(EncryptedBundle {
        ciphertext: sealed.ciphertext,
        salt: salt.to_vec(),
        nonce: sealed.nonce.to_vec(),
        auth_tag: sealed.tag.to_vec(),
    })
}
