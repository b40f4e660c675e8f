// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module manifest model.
//!
//! Every module outside the builtin set ships a sidecar manifest
//! (`<stem>.provider.toml`). Discovery uses it to decide applicability and
//! to pick the highest version among same-named modules; sandboxed loaders
//! use the declared types as the module's reflection surface.

use serde::{Deserialize, Serialize};

use crate::types::{FourPartVersion, MemberForm, MemberInfo, MemberSignature, ValueKind};

/// Suffix appended to a module's file stem to find its manifest.
pub const SIDECAR_SUFFIX: &str = ".provider.toml";

/// Parsed module manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    pub version: FourPartVersion,
    /// Semver requirement on the host, e.g. `">=0.1, <2"`.
    pub host_version: Option<String>,
    /// Operating systems the module supports; empty means any.
    pub platforms: Vec<String>,
    pub resources: ModuleResources,
    pub types: Vec<TypeDecl>,
}

impl ModuleManifest {
    /// True when the manifest accepts this host version and OS.
    ///
    /// An unparseable host requirement makes the manifest inapplicable.
    pub fn is_applicable(&self, host_version: &semver::Version, os: &str) -> bool {
        if !self.platforms.is_empty() && !self.platforms.iter().any(|p| p.eq_ignore_ascii_case(os))
        {
            return false;
        }
        match &self.host_version {
            None => true,
            Some(req) => semver::VersionReq::parse(req)
                .map(|r| r.matches(host_version))
                .unwrap_or(false),
        }
    }
}

/// Sandbox limits for one call into the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResources {
    #[serde(default = "default_fuel")]
    pub fuel: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModuleResources {
    fn default() -> Self {
        Self {
            fuel: default_fuel(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_fuel() -> u64 {
    1_000_000_000
}

fn default_timeout_secs() -> u64 {
    5
}

/// A public type declared by a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default = "default_true")]
    pub default_constructor: bool,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

fn default_true() -> bool {
    true
}

/// A member declared on a module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ValueKind>,
    #[serde(default = "default_unit")]
    pub returns: ValueKind,
    #[serde(default = "default_form")]
    pub form: MemberForm,
}

fn default_unit() -> ValueKind {
    ValueKind::Unit
}

fn default_form() -> MemberForm {
    MemberForm::Method
}

impl MemberDecl {
    pub fn to_member_info(&self) -> MemberInfo {
        MemberInfo {
            name: self.name.clone(),
            signature: MemberSignature::new(self.params.clone(), self.returns),
            form: self.form,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(host_version: Option<&str>, platforms: &[&str]) -> ModuleManifest {
        ModuleManifest {
            name: "foo".into(),
            version: FourPartVersion::new(1, 0, 0, 0),
            host_version: host_version.map(str::to_string),
            platforms: platforms.iter().map(|p| p.to_string()).collect(),
            resources: ModuleResources::default(),
            types: vec![],
        }
    }

    #[test]
    fn applicable_without_constraints() {
        let host = semver::Version::new(0, 1, 0);
        assert!(manifest(None, &[]).is_applicable(&host, "linux"));
    }

    #[test]
    fn host_requirement_is_enforced() {
        let host = semver::Version::new(0, 1, 0);
        assert!(manifest(Some(">=0.1"), &[]).is_applicable(&host, "linux"));
        assert!(!manifest(Some(">=2"), &[]).is_applicable(&host, "linux"));
        assert!(!manifest(Some("not a req"), &[]).is_applicable(&host, "linux"));
    }

    #[test]
    fn platform_list_is_case_insensitive() {
        let host = semver::Version::new(0, 1, 0);
        let m = manifest(None, &["Linux", "macos"]);
        assert!(m.is_applicable(&host, "linux"));
        assert!(!m.is_applicable(&host, "windows"));
    }

    #[test]
    fn member_decl_converts_to_member_info() {
        let decl = MemberDecl {
            name: "find_package".into(),
            params: vec![ValueKind::String],
            returns: ValueKind::Json,
            form: MemberForm::Method,
        };
        let info = decl.to_member_info();
        assert_eq!(info.signature.params, vec![ValueKind::String]);
        assert_eq!(info.signature.returns, ValueKind::Json);
    }
}
