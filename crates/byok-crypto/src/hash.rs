// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret fingerprints for duplicate detection and lookup.

use ring::digest;
use subtle::ConstantTimeEq;

/// Hex-encoded SHA-256 of the plaintext secret.
///
/// Stable across processes and master secrets, so it stays valid through
/// master rotation.
pub fn hash_secret(plaintext: &str) -> String {
    hex::encode(digest::digest(&digest::SHA256, plaintext.as_bytes()))
}

/// Constant-time check that `plaintext` hashes to `expected_hex`.
pub fn compare_hash(plaintext: &str, expected_hex: &str) -> bool {
    let actual = hash_secret(plaintext);
    actual.as_bytes().ct_eq(expected_hex.as_bytes()).into()
}

/// Mask a secret for display: first 4 characters, then `...`, then the last 4.
/// Secrets of 8 characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
