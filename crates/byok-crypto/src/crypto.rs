// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open with a detached authentication tag.
//!
//! Every call to [`seal`] draws a fresh random 96-bit nonce from the system
//! CSPRNG. Nonce reuse under one key would break GCM.

use byok_core::ByokError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// AES-256-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Output of [`seal`]: ciphertext (same length as the plaintext), nonce, tag.
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

fn aes_key(key: &[u8; 32]) -> Result<LessSafeKey, ()> {
    UnboundKey::new(&AES_256_GCM, key)
        .map(LessSafeKey::new)
        .map_err(|_| ())
}

/// Encrypt `plaintext`, binding `aad` into the tag.
pub fn seal(key: &[u8; 32], aad: &[u8], plaintext: &[u8]) -> Result<Sealed, ByokError> {
    let key = aes_key(key)
        .map_err(|_| ByokError::Encryption("failed to create AES-256-GCM key".to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| ByokError::Encryption("failed to generate random nonce".to_string()))?;

    // The working copy holds plaintext until sealing overwrites it.
    let mut in_out = Zeroizing::new(plaintext.to_vec());
    let tag = key
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(aad),
            in_out.as_mut_slice(),
        )
        .map_err(|_| ByokError::Encryption("AES-256-GCM encryption failed".to_string()))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(Sealed {
        ciphertext: std::mem::take(&mut *in_out),
        nonce,
        tag: tag_bytes,
    })
}

/// Decrypt and verify. Fails closed: a wrong key, wrong `aad`, or any
/// modified byte yields `Decryption` and no plaintext.
pub fn open(
    key: &[u8; 32],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ByokError> {
    let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
        ByokError::Decryption(format!("corrupted nonce (expected {NONCE_LEN} bytes)"))
    })?;
    if tag.len() != TAG_LEN {
        return Err(ByokError::Decryption(format!(
            "corrupted auth tag (expected {TAG_LEN} bytes)"
        )));
    }
    let key = aes_key(key)
        .map_err(|_| ByokError::Decryption("failed to create AES-256-GCM key".to_string()))?;

    let mut in_out = Zeroizing::new(Vec::with_capacity(ciphertext.len() + TAG_LEN));
    in_out.extend_from_slice(ciphertext);
    in_out.extend_from_slice(tag);

    let plaintext_len = key
        .open_in_place(
            Nonce::assume_unique_for_key(nonce),
            Aad::from(aad),
            in_out.as_mut_slice(),
        )
        .map_err(|_| {
            ByokError::Decryption(
                "AES-256-GCM authentication failed -- wrong tenant or corrupted data".to_string(),
            )
        })?
        .len();

    in_out.truncate(plaintext_len);
    Ok(in_out)
}
