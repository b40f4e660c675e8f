// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the provman configuration system.

use std::path::PathBuf;

use provman_config::model::ProvmanConfig;
use provman_config::{load_and_validate_str, load_config_from_str, ConfigError};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn full_config_deserializes() {
    let toml = r#"
[discovery]
bundled_modules = ["builtin:core"]
machine_modules = ["/opt/providers/zip.wasm"]
user_modules = ["/home/u/providers/foo.wasm"]
machine_extension_dir = "/opt/provman/ext"
user_extension_dir = "/home/u/.local/share/provman/providers"
scan_host_dir = false
module_extensions = ["wasm"]

[loader]
workers = 4
default_fuel = 5000000
default_timeout_secs = 2

[bootstrap]
feeds = ["https://mirror.example/catalog.json"]
timeout_secs = 15
destination = "/tmp/provman-install"

[log]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.discovery.machine_modules, vec!["/opt/providers/zip.wasm"]);
    assert_eq!(config.discovery.user_modules.len(), 1);
    assert!(!config.discovery.scan_host_dir);
    assert_eq!(
        config.discovery.machine_extension_dir,
        Some(PathBuf::from("/opt/provman/ext"))
    );
    assert_eq!(config.loader.workers, 4);
    assert_eq!(config.loader.default_fuel, 5_000_000);
    assert_eq!(config.bootstrap.feeds, vec!["https://mirror.example/catalog.json"]);
    assert_eq!(config.bootstrap.timeout_secs, 15);
    assert_eq!(
        config.install_destination(),
        Some(PathBuf::from("/tmp/provman-install"))
    );
    assert_eq!(config.log.level, "debug");
}

/// Without an explicit destination, bootstrap installs into the user extension dir.
#[test]
fn install_destination_falls_back_to_user_dir() {
    let config = load_config_from_str(
        "[discovery]\nuser_extension_dir = \"/home/u/ext\"\n",
    )
    .unwrap();
    assert_eq!(config.install_destination(), Some(PathBuf::from("/home/u/ext")));
}

/// Unknown field produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_field_suggests_correction() {
    let errors = load_and_validate_str("[loader]\nworkrs = 3\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "workrs");
            assert_eq!(suggestion.as_deref(), Some("workers"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[plugins]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

/// Wrong value type is reported as InvalidType.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[loader]\nworkers = \"many\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

/// Semantic validation runs after deserialization.
#[test]
fn plain_http_feed_fails_validation() {
    let errors =
        load_and_validate_str("[bootstrap]\nfeeds = [\"http://plain.example/c.json\"]\n")
            .unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
    assert!(errors[0].to_string().contains("https"));
}

/// Defaults round-trip through serde.
#[test]
fn defaults_serialize_and_reload() {
    let defaults = ProvmanConfig::default();
    let json = serde_json::to_string(&defaults).unwrap();
    let back: ProvmanConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.loader.workers, defaults.loader.workers);
    assert_eq!(back.discovery.bundled_modules, defaults.discovery.bundled_modules);
}
