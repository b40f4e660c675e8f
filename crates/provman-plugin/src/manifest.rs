// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sidecar manifest parsing from `<stem>.provider.toml` files.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use provman_core::{FourPartVersion, ModuleManifest, ModuleResources, ProvmanError, Result, TypeDecl};

pub use provman_core::SIDECAR_SUFFIX;

/// Intermediate TOML deserialization struct for a sidecar manifest.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    provider: ProviderSection,
    #[serde(default)]
    resources: Option<ModuleResources>,
    #[serde(default)]
    types: Vec<TypeDecl>,
}

/// The `[provider]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderSection {
    name: String,
    version: String,
    host_version: Option<String>,
    #[serde(default)]
    platforms: Vec<String>,
}

/// Parses a module manifest from TOML content.
///
/// Name must be non-empty and version a valid four-part version. Type and
/// member names must be non-empty.
pub fn parse_module_manifest(toml_content: &str) -> Result<ModuleManifest> {
    let file: ManifestFile = toml::from_str(toml_content)
        .map_err(|e| ProvmanError::Config(format!("invalid provider manifest: {e}")))?;

    let section = file.provider;
    if section.name.trim().is_empty() {
        return Err(ProvmanError::Config(
            "provider manifest: name must not be empty".to_string(),
        ));
    }

    let version: FourPartVersion = section.version.parse().map_err(|_| {
        ProvmanError::Config(format!(
            "provider manifest: invalid version '{}'",
            section.version
        ))
    })?;

    if let Some(req) = &section.host_version {
        semver::VersionReq::parse(req).map_err(|e| {
            ProvmanError::Config(format!("provider manifest: invalid host_version '{req}': {e}"))
        })?;
    }

    for ty in &file.types {
        if ty.name.trim().is_empty() {
            return Err(ProvmanError::Config(
                "provider manifest: type name must not be empty".to_string(),
            ));
        }
        if let Some(m) = ty.members.iter().find(|m| m.name.trim().is_empty()) {
            return Err(ProvmanError::Config(format!(
                "provider manifest: type '{}' has a member without a name ({m:?})",
                ty.name
            )));
        }
    }

    Ok(ModuleManifest {
        name: section.name,
        version,
        host_version: section.host_version,
        platforms: section.platforms,
        resources: file.resources.unwrap_or_default(),
        types: file.types,
    })
}

/// Where the sidecar manifest of `module_path` lives.
pub fn sidecar_path(module_path: &Path) -> Option<PathBuf> {
    let stem = module_path.file_stem()?.to_str()?;
    Some(module_path.with_file_name(format!("{stem}{SIDECAR_SUFFIX}")))
}

/// Reads and parses the sidecar of `module_path`.
///
/// Returns `Ok(None)` when the module has no sidecar.
pub async fn read_sidecar(module_path: &Path) -> Result<Option<ModuleManifest>> {
    let Some(path) = sidecar_path(module_path) else {
        return Ok(None);
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => parse_module_manifest(&content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
