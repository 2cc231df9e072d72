// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every violation instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::{ByokConfig, MIN_KDF_ITERATIONS};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate semantic constraints serde cannot express.
pub fn validate_config(config: &ByokConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(ConfigError::validation(format!(
            "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
            config.vault.kdf_iterations
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.router.failure_threshold == 0 {
        errors.push(ConfigError::validation(
            "router.failure_threshold must be at least 1",
        ));
    }
    if config.router.cooldown_secs == 0 {
        errors.push(ConfigError::validation(
            "router.cooldown_secs must be at least 1",
        ));
    }
    if config.router.least_used_window_secs == 0 {
        errors.push(ConfigError::validation(
            "router.least_used_window_secs must be at least 1",
        ));
    }

    let timeout = config.validator.probe_timeout_secs;
    if !(1..=30).contains(&timeout) {
        errors.push(ConfigError::validation(format!(
            "validator.probe_timeout_secs must be between 1 and 30, got {timeout}"
        )));
    }
    let alpha = config.validator.health_alpha;
    if !(alpha > 0.0 && alpha <= 1.0) {
        errors.push(ConfigError::validation(format!(
            "validator.health_alpha must be in (0, 1], got {alpha}"
        )));
    }
    if config.validator.max_consecutive_failures == 0 {
        errors.push(ConfigError::validation(
            "validator.max_consecutive_failures must be at least 1",
        ));
    }

    if config.housekeeping.interval_secs == 0 {
        errors.push(ConfigError::validation(
            "housekeeping.interval_secs must be at least 1",
        ));
    }
    if config.housekeeping.usage_retention_days == 0 {
        errors.push(ConfigError::validation(
            "housekeeping.usage_retention_days must be at least 1",
        ));
    }
    if config.housekeeping.audit_retention_days == 0 {
        errors.push(ConfigError::validation(
            "housekeeping.audit_retention_days must be at least 1",
        ));
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ByokConfig::default()).is_ok());
    }

    #[test]
    fn low_kdf_iterations_rejected() {
        let mut config = ByokConfig::default();
        config.vault.kdf_iterations = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("kdf_iterations"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ByokConfig::default();
        config.router.failure_threshold = 0;
        config.validator.health_alpha = 0.0;
        config.validator.probe_timeout_secs = 120;
        config.log.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn alpha_of_one_is_allowed() {
        let mut config = ByokConfig::default();
        config.validator.health_alpha = 1.0;
        assert!(validate_config(&config).is_ok());
    }
}
