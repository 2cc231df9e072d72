// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `/etc/byok/byok.toml`, then `~/.config/byok/byok.toml`, then
//! `./byok.toml`, then `BYOK_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ByokConfig;

/// Sections that `BYOK_<SECTION>_<KEY>` variables may target.
const ENV_SECTIONS: &[&str] = &[
    "vault",
    "storage",
    "router",
    "validator",
    "housekeeping",
    "log",
];

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/byok/byok.toml";

/// Local config file name, resolved against the working directory.
pub const LOCAL_CONFIG_FILE: &str = "byok.toml";

/// User config path under the XDG config dir, if one exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("byok").join("byok.toml"))
}

/// Figment for the full hierarchy, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(ByokConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG_FILE)).merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<ByokConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ByokConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ByokConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ByokConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ByokConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// `BYOK_ROUTER_COOLDOWN_SECS` maps to `router.cooldown_secs`.
///
/// Only the first underscore after a known section name becomes a dot, since
/// key names themselves contain underscores. Variables outside the known
/// sections (`BYOK_MASTER_SECRET`, `BYOK_NEW_MASTER_SECRET`) are not config
/// keys and are filtered out.
fn env_provider() -> Env {
    Env::prefixed("BYOK_")
        .filter(|key| section_key(key.as_str()).is_some())
        .map(|key| {
            section_key(key.as_str())
                .unwrap_or_else(|| key.as_str().to_ascii_lowercase())
                .into()
        })
}

fn section_key(raw: &str) -> Option<String> {
    let key = raw.to_ascii_lowercase();
    ENV_SECTIONS.iter().find_map(|section| {
        key.strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("{section}.{rest}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_key_maps_first_underscore_only() {
        assert_eq!(
            section_key("ROUTER_COOLDOWN_SECS").as_deref(),
            Some("router.cooldown_secs")
        );
        assert_eq!(
            section_key("vault_kdf_iterations").as_deref(),
            Some("vault.kdf_iterations")
        );
    }

    #[test]
    fn non_section_variables_are_ignored() {
        assert_eq!(section_key("MASTER_SECRET"), None);
        assert_eq!(section_key("NEW_MASTER_SECRET"), None);
        assert_eq!(section_key("router_"), None);
    }
}
