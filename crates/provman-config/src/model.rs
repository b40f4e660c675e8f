// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently ignored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level provman configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvmanConfig {
    /// Where candidate modules come from.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Module loading settings.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Bootstrap catalog and download settings.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Module path sources, in the order discovery consults them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Modules loaded on the first scan only.
    #[serde(default = "default_bundled_modules")]
    pub bundled_modules: Vec<String>,

    /// Module paths registered for every user of the machine.
    #[serde(default)]
    pub machine_modules: Vec<String>,

    /// Module paths registered for the current user.
    #[serde(default)]
    pub user_modules: Vec<String>,

    /// Machine-wide extension directory scanned for modules.
    #[serde(default = "default_machine_extension_dir")]
    pub machine_extension_dir: Option<PathBuf>,

    /// Per-user extension directory scanned for modules.
    #[serde(default = "default_user_extension_dir")]
    pub user_extension_dir: Option<PathBuf>,

    /// Also scan the directory holding the host executable.
    #[serde(default = "default_true")]
    pub scan_host_dir: bool,

    /// File extensions (without the dot) treated as modules when scanning.
    #[serde(default = "default_module_extensions")]
    pub module_extensions: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bundled_modules: default_bundled_modules(),
            machine_modules: Vec::new(),
            user_modules: Vec::new(),
            machine_extension_dir: default_machine_extension_dir(),
            user_extension_dir: default_user_extension_dir(),
            scan_host_dir: true,
            module_extensions: default_module_extensions(),
        }
    }
}

fn default_bundled_modules() -> Vec<String> {
    vec!["builtin:core".to_string()]
}

fn default_machine_extension_dir() -> Option<PathBuf> {
    Some(PathBuf::from("/usr/local/share/provman/providers"))
}

fn default_user_extension_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("provman/providers"))
}

fn default_module_extensions() -> Vec<String> {
    vec!["wasm".to_string()]
}

fn default_true() -> bool {
    true
}

/// Module loader configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Maximum number of modules loaded concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fuel per sandboxed call when a manifest does not set one.
    #[serde(default = "default_fuel")]
    pub default_fuel: u64,

    /// Wall-clock limit per sandboxed call when a manifest does not set one.
    #[serde(default = "default_call_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_fuel: default_fuel(),
            default_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    8
}

fn default_fuel() -> u64 {
    1_000_000_000
}

fn default_call_timeout_secs() -> u64 {
    5
}

/// Bootstrap provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Catalog feed URLs. Must be HTTPS.
    #[serde(default = "default_feeds")]
    pub feeds: Vec<String>,

    /// Transport timeout per download attempt.
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,

    /// Install destination. Defaults to the user extension directory.
    #[serde(default)]
    pub destination: Option<PathBuf>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            timeout_secs: default_download_timeout_secs(),
            destination: None,
        }
    }
}

fn default_feeds() -> Vec<String> {
    vec!["https://providers.provman.dev/catalog.json".to_string()]
}

fn default_download_timeout_secs() -> u64 {
    60
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

impl ProvmanConfig {
    /// Where bootstrap installs providers: the explicit destination, else
    /// the user extension directory.
    pub fn install_destination(&self) -> Option<PathBuf> {
        self.bootstrap
            .destination
            .clone()
            .or_else(|| self.discovery.user_extension_dir.clone())
    }
}
