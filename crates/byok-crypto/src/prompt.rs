// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master secret acquisition via environment variable, config, or TTY prompt.

use byok_config::model::VaultConfig;
use byok_core::ByokError;
use secrecy::SecretString;

use crate::master::MasterSecret;

/// Environment variable holding the active master secret.
pub const MASTER_SECRET_ENV_VAR: &str = "BYOK_MASTER_SECRET";

/// Environment variable holding the replacement secret during rotation.
pub const NEW_MASTER_SECRET_ENV_VAR: &str = "BYOK_NEW_MASTER_SECRET";

/// Resolve the active master secret.
///
/// Priority:
/// 1. `BYOK_MASTER_SECRET` environment variable
/// 2. `vault.master_secret` from the config file
/// 3. Interactive TTY prompt
pub fn get_master_secret(config: &VaultConfig) -> Result<MasterSecret, ByokError> {
    if let Some(secret) = read_env(MASTER_SECRET_ENV_VAR) {
        return MasterSecret::new(secret);
    }
    if let Some(secret) = config.master_secret.as_ref()
        && !secret.is_empty()
    {
        return MasterSecret::new(SecretString::from(secret.clone()));
    }
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let secret = prompt("Master secret: ")?;
        return MasterSecret::new(secret);
    }
    Err(ByokError::Configuration(format!(
        "No master secret provided. Set {MASTER_SECRET_ENV_VAR} or run interactively."
    )))
}

/// Resolve the replacement master secret for rotation. Interactive entry is
/// confirmed twice.
pub fn get_new_master_secret() -> Result<MasterSecret, ByokError> {
    if let Some(secret) = read_env(NEW_MASTER_SECRET_ENV_VAR) {
        return MasterSecret::new(secret);
    }
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        let first = prompt("New master secret: ")?;
        let second = prompt("Confirm new master secret: ")?;
        {
            use secrecy::ExposeSecret;
            if first.expose_secret() != second.expose_secret() {
                return Err(ByokError::Configuration(
                    "master secrets do not match".to_string(),
                ));
            }
        }
        return MasterSecret::new(first);
    }
    Err(ByokError::Configuration(format!(
        "No new master secret provided. Set {NEW_MASTER_SECRET_ENV_VAR} or run interactively."
    )))
}

fn read_env(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

fn prompt(label: &str) -> Result<SecretString, ByokError> {
    eprint!("{label}");
    let value = rpassword::read_password()
        .map_err(|e| ByokError::Configuration(format!("failed to read master secret: {e}")))?;
    if value.is_empty() {
        return Err(ByokError::Configuration(
            "empty master secret not allowed".to_string(),
        ));
    }
    Ok(SecretString::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const STRONG: &str = "Correct-Horse-Battery-Staple-2026-master";

    #[test]
    #[serial]
    fn env_var_wins_over_config() {
        // SAFETY: test-only env mutation, serialized with #[serial].
        unsafe { std::env::set_var(MASTER_SECRET_ENV_VAR, STRONG) };
        let config = VaultConfig {
            master_secret: Some("weak".to_string()),
            ..VaultConfig::default()
        };
        let result = get_master_secret(&config);
        unsafe { std::env::remove_var(MASTER_SECRET_ENV_VAR) };

        assert!(result.is_ok());
    }

    #[test]
    #[serial]
    fn config_secret_is_used_without_env() {
        unsafe { std::env::remove_var(MASTER_SECRET_ENV_VAR) };
        let config = VaultConfig {
            master_secret: Some(STRONG.to_string()),
            ..VaultConfig::default()
        };
        assert!(get_master_secret(&config).is_ok());
    }

    #[test]
    #[serial]
    fn weak_env_secret_is_rejected() {
        unsafe { std::env::set_var(MASTER_SECRET_ENV_VAR, "password") };
        let result = get_master_secret(&VaultConfig::default());
        unsafe { std::env::remove_var(MASTER_SECRET_ENV_VAR) };

        assert!(matches!(result, Err(ByokError::Configuration(_))));
    }

    #[test]
    #[serial]
    fn new_secret_from_env() {
        unsafe { std::env::set_var(NEW_MASTER_SECRET_ENV_VAR, STRONG) };
        let result = get_new_master_secret();
        unsafe { std::env::remove_var(NEW_MASTER_SECRET_ENV_VAR) };

        assert!(result.is_ok());
    }
}
