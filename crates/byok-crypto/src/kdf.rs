// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2-HMAC-SHA256 per-tenant key derivation.
//!
//! The password is the master secret concatenated with the tenant id, so two
//! tenants never share a key even with the same salt.

use std::num::NonZeroU32;

use byok_core::ByokError;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::master::MasterSecret;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Derive the 32-byte key for `tenant_id` from the master secret and `salt`.
pub fn derive_key(
    master: &MasterSecret,
    tenant_id: &str,
    salt: &[u8],
    iterations: NonZeroU32,
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut password = Zeroizing::new(Vec::with_capacity(
        master.as_bytes().len() + tenant_id.len(),
    ));
    password.extend_from_slice(master.as_bytes());
    password.extend_from_slice(tenant_id.as_bytes());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        &password,
        key.as_mut(),
    );
    key
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], ByokError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| ByokError::Encryption("failed to generate random salt".to_string()))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    const ITERATIONS: NonZeroU32 = NonZeroU32::new(100_000).unwrap();

    fn master() -> MasterSecret {
        MasterSecret::new(SecretString::from(
            "Correct-Horse-Battery-Staple-2026-master".to_string(),
        ))
        .unwrap()
    }

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [3u8; SALT_LEN];
        let a = derive_key(&master(), "tenant-a", &salt, ITERATIONS);
        let b = derive_key(&master(), "tenant-a", &salt, ITERATIONS);
        assert_eq!(*a, *b);
    }

    #[test]
    fn tenants_get_different_keys() {
        let salt = [3u8; SALT_LEN];
        let a = derive_key(&master(), "tenant-a", &salt, ITERATIONS);
        let b = derive_key(&master(), "tenant-b", &salt, ITERATIONS);
        assert_ne!(*a, *b);
    }

    #[test]
    fn salt_changes_key() {
        let a = derive_key(&master(), "tenant-a", &[1u8; SALT_LEN], ITERATIONS);
        let b = derive_key(&master(), "tenant-a", &[2u8; SALT_LEN], ITERATIONS);
        assert_ne!(*a, *b);
    }

    #[test]
    fn generated_salts_are_random() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_ne!(a, b);
    }
}
