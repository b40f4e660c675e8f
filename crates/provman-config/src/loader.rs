// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports `./provman.toml` > `~/.config/provman/provman.toml` >
//! `/etc/provman/provman.toml` with `PROVMAN_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ProvmanConfig;

/// Machine-scope configuration file.
pub const MACHINE_CONFIG_PATH: &str = "/etc/provman/provman.toml";

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/provman/provman.toml` (machine scope)
/// 3. `~/.config/provman/provman.toml` (user scope)
/// 4. `./provman.toml` (local directory)
/// 5. `PROVMAN_*` environment variables
pub fn load_config() -> Result<ProvmanConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
pub fn load_config_from_str(toml_content: &str) -> Result<ProvmanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProvmanConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ProvmanConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProvmanConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ProvmanConfig::default()))
        .merge(Toml::file(MACHINE_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("provman/provman.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("provman.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `PROVMAN_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores (`PROVMAN_BOOTSTRAP_TIMEOUT_SECS` is
/// `bootstrap.timeout_secs`).
fn env_provider() -> Env {
    Env::prefixed("PROVMAN_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["discovery", "loader", "bootstrap", "log"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(&format!("{section}_"))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
