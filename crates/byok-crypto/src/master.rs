// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The deployment master secret and its strength rules.

use byok_core::ByokError;
use secrecy::{ExposeSecret, SecretString};

/// Minimum master secret length in characters.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Minimum number of character classes (lower, upper, digit, symbol).
pub const MIN_CHARACTER_CLASSES: usize = 3;

/// A master secret that passed the strength check.
///
/// Never printed: `Debug` is redacted and the inner value is only reachable
/// as bytes for key derivation.
pub struct MasterSecret(SecretString);

impl MasterSecret {
    /// Validate `secret` and wrap it.
    ///
    /// Rejects secrets shorter than 32 characters, secrets drawing on fewer
    /// than three character classes, and a single repeated character.
    pub fn new(secret: SecretString) -> Result<Self, ByokError> {
        check_strength(secret.expose_secret())?;
        Ok(Self(secret))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret([REDACTED])")
    }
}

fn check_strength(secret: &str) -> Result<(), ByokError> {
    let len = secret.chars().count();
    if len < MIN_MASTER_SECRET_LEN {
        return Err(ByokError::Configuration(format!(
            "master secret must be at least {MIN_MASTER_SECRET_LEN} characters, got {len}"
        )));
    }

    let mut chars = secret.chars();
    if let Some(first) = chars.next()
        && chars.all(|c| c == first)
    {
        return Err(ByokError::Configuration(
            "master secret must not be a single repeated character".to_string(),
        ));
    }

    let classes = [
        secret.chars().any(|c| c.is_lowercase()),
        secret.chars().any(|c| c.is_uppercase()),
        secret.chars().any(|c| c.is_ascii_digit()),
        secret.chars().any(|c| !c.is_alphanumeric()),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    if classes < MIN_CHARACTER_CLASSES {
        return Err(ByokError::Configuration(format!(
            "master secret must mix at least {MIN_CHARACTER_CLASSES} of: lowercase, uppercase, digits, symbols"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(s: &str) -> Result<MasterSecret, ByokError> {
        MasterSecret::new(SecretString::from(s.to_string()))
    }

    #[test]
    fn strong_secret_is_accepted() {
        assert!(check("Correct-Horse-Battery-Staple-2026-master").is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = check("Sh0rt-Secret!").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn two_classes_is_not_enough() {
        assert!(check("abcdefghijklmnopqrstuvwxyz0123456789").is_err());
    }

    #[test]
    fn three_classes_without_symbols_is_enough() {
        assert!(check("abcdefghijklmnopqrstuvwxyzABCDEF0123").is_ok());
    }

    #[test]
    fn repeated_character_is_rejected() {
        let err = check(&"a".repeat(40)).unwrap_err();
        assert!(err.to_string().contains("repeated"));
    }

    #[test]
    fn debug_is_redacted() {
        let secret = check("Correct-Horse-Battery-Staple-2026-master").unwrap();
        let out = format!("{secret:?}");
        assert!(!out.contains("Horse"));
        assert!(out.contains("REDACTED"));
    }
}
