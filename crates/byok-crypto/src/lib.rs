// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptography for the BYOK credential vault.
//!
//! - PBKDF2-HMAC-SHA256 derives a per-tenant key from the master secret,
//!   the tenant id, and a random salt.
//! - AES-256-GCM encrypts each secret with a fresh nonce, the tenant id as
//!   associated data, and a detached authentication tag.
//! - SHA-256 fingerprints support duplicate detection without decrypting.
//!
//! All intermediate key and plaintext buffers are zeroed on drop.

pub mod cipher;
pub mod crypto;
pub mod handle;
pub mod hash;
pub mod kdf;
pub mod master;
pub mod prompt;

pub use cipher::TenantCipher;
pub use handle::{CipherHandle, offload};
pub use hash::{compare_hash, hash_secret, mask_secret};
pub use master::MasterSecret;
pub use prompt::{get_master_secret, get_new_master_secret};
