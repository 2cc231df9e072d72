// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the BYOK vault.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! at startup instead of silently falling back to a default.

use byok_core::Environment;
use serde::{Deserialize, Serialize};

/// Lowest PBKDF2 iteration count the vault accepts.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Top-level vault configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ByokConfig {
    /// Key derivation and master secret settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fallback router and circuit breaker settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Credential validation settings.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Periodic cleanup settings.
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Key derivation settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// PBKDF2-HMAC-SHA256 iterations per key derivation.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Master secret. Prefer the `BYOK_MASTER_SECRET` environment variable.
    #[serde(default)]
    pub master_secret: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: default_kdf_iterations(),
            master_secret: None,
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("kdf_iterations", &self.kdf_iterations)
            .field(
                "master_secret",
                &self.master_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("byok").join("byok.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("byok.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Fallback router and circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Consecutive reported failures that open a credential's breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before allowing a half-open trial.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Environment used by `get_fallback_credential` when none is given.
    #[serde(default)]
    pub default_environment: Environment,

    /// Window for the `least_used` strategy's usage counts.
    #[serde(default = "default_least_used_window_secs")]
    pub least_used_window_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            default_environment: Environment::default(),
            least_used_window_secs: default_least_used_window_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_least_used_window_secs() -> u64 {
    3600
}

/// Credential validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Upper bound on a single provider liveness probe.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Weight of the newest sample in the health score moving average.
    #[serde(default = "default_health_alpha")]
    pub health_alpha: f64,

    /// Consecutive hard failures before a credential is marked invalid.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            health_alpha: default_health_alpha(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_health_alpha() -> f64 {
    0.3
}

fn default_max_consecutive_failures() -> u32 {
    3
}

/// Periodic cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HousekeepingConfig {
    /// Seconds between housekeeping passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Usage records older than this are deleted.
    #[serde(default = "default_usage_retention_days")]
    pub usage_retention_days: u32,

    /// Audit entries older than this are deleted.
    #[serde(default = "default_audit_retention_days")]
    pub audit_retention_days: u32,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            usage_retention_days: default_usage_retention_days(),
            audit_retention_days: default_audit_retention_days(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_usage_retention_days() -> u32 {
    90
}

fn default_audit_retention_days() -> u32 {
    365
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
