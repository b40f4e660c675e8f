// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every violation instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::ProvmanConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &ProvmanConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.loader.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "loader.workers must be at least 1".to_string(),
        });
    }

    if config.loader.default_fuel == 0 {
        errors.push(ConfigError::Validation {
            message: "loader.default_fuel must be positive".to_string(),
        });
    }

    if config.discovery.module_extensions.is_empty() {
        errors.push(ConfigError::Validation {
            message: "discovery.module_extensions must list at least one extension".to_string(),
        });
    }

    for ext in &config.discovery.module_extensions {
        if ext.starts_with('.') || ext.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!(
                    "discovery.module_extensions entry `{ext}` must be a bare extension like `wasm`"
                ),
            });
        }
    }

    for feed in &config.bootstrap.feeds {
        if !feed.starts_with("https://") {
            errors.push(ConfigError::Validation {
                message: format!("bootstrap.feeds entry `{feed}` must use https"),
            });
        }
    }

    if config.bootstrap.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "bootstrap.timeout_secs must be positive".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
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
    fn defaults_are_valid() {
        assert!(validate_config(&ProvmanConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_violations() {
        let mut config = ProvmanConfig::default();
        config.loader.workers = 0;
        config.bootstrap.feeds = vec!["http://insecure.example/feed.json".into()];
        config.log.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn dotted_extension_is_rejected() {
        let mut config = ProvmanConfig::default();
        config.discovery.module_extensions = vec![".wasm".into()];
        assert!(validate_config(&config).is_err());
    }
}
