// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapter, loader, registry, and bootstrap crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ProvmanError;
use crate::traits::CandidateObject;

/// Identifies which provider contract a registry entry belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ProviderCategory {
    PackageProvider,
    Archiver,
    Downloader,
    MetaProvider,
}

/// Ordinal four-part version (`major.minor.build.revision`).
///
/// Missing trailing parts parse as zero, so `"2"` and `"2.0.0.0"` compare
/// equal. Ordering is lexicographic over the four parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourPartVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl FourPartVersion {
    /// Version assigned when neither the provider nor its module declares one.
    pub const FALLBACK: FourPartVersion = FourPartVersion::new(0, 0, 0, 1);

    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// True for `0.0.0.0`, which providers return when they have no opinion.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl FromStr for FourPartVersion {
    type Err = ProvmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProvmanError::InvalidArgument(
                "version string must not be empty".to_string(),
            ));
        }

        let mut parts = [0u32; 4];
        for (i, piece) in trimmed.split('.').enumerate() {
            if i >= 4 {
                return Err(ProvmanError::InvalidArgument(format!(
                    "version `{trimmed}` has more than four parts"
                )));
            }
            parts[i] = piece.parse().map_err(|_| {
                ProvmanError::InvalidArgument(format!(
                    "version `{trimmed}` has a non-numeric part `{piece}`"
                ))
            })?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl fmt::Display for FourPartVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl From<semver::Version> for FourPartVersion {
    fn from(v: semver::Version) -> Self {
        let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
        Self::new(clamp(v.major), clamp(v.minor), clamp(v.patch), 0)
    }
}

impl Serialize for FourPartVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FourPartVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The kind of a parameter or return value crossing the adapter boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValueKind {
    Unit,
    Bool,
    Int,
    String,
    StringList,
    Json,
    Object,
}

impl ValueKind {
    /// The zero or absence value a stub returns for this kind.
    pub fn default_value(self) -> Value {
        let data = match self {
            ValueKind::Unit | ValueKind::String | ValueKind::Json | ValueKind::Object => {
                serde_json::Value::Null
            }
            ValueKind::Bool => serde_json::Value::Bool(false),
            ValueKind::Int => serde_json::Value::from(0),
            ValueKind::StringList => serde_json::Value::Array(Vec::new()),
        };
        Value::Data(data)
    }
}

/// Parameter and return kinds of a member. Two signatures match only when
/// they are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSignature {
    #[serde(default)]
    pub params: Vec<ValueKind>,
    #[serde(default = "default_returns")]
    pub returns: ValueKind,
}

fn default_returns() -> ValueKind {
    ValueKind::Unit
}

impl MemberSignature {
    pub fn new(params: impl Into<Vec<ValueKind>>, returns: ValueKind) -> Self {
        Self {
            params: params.into(),
            returns,
        }
    }
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "({}) -> {}", params.join(", "), self.returns)
    }
}

/// How a candidate exposes a member on its reflection surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberForm {
    /// A public method, called through `CandidateObject::invoke`.
    Method,
    /// A public field holding a callable value.
    CallableField,
}

/// One entry of a candidate's reflection surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberInfo {
    pub name: String,
    pub signature: MemberSignature,
    pub form: MemberForm,
}

impl MemberInfo {
    pub fn method(name: impl Into<String>, signature: MemberSignature) -> Self {
        Self {
            name: name.into(),
            signature,
            form: MemberForm::Method,
        }
    }

    pub fn field(name: impl Into<String>, signature: MemberSignature) -> Self {
        Self {
            name: name.into(),
            signature,
            form: MemberForm::CallableField,
        }
    }
}

/// A value returned across the adapter boundary.
///
/// Most members exchange plain data. Meta-providers hand back live objects
/// from `create_provider`, which the loader then adapts in turn.
#[derive(Clone)]
pub enum Value {
    Data(serde_json::Value),
    Object(Arc<dyn CandidateObject>),
}

impl Value {
    pub fn unit() -> Self {
        Value::Data(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Data(serde_json::Value::Null))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Data(v) => v.as_bool(),
            Value::Object(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Data(v) => v.as_i64(),
            Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Data(v) => v.as_str(),
            Value::Object(_) => None,
        }
    }

    /// Reads a string list. Non-string entries are skipped.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Value::Data(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Value::Data(v) => Some(v),
            Value::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<Arc<dyn CandidateObject>> {
        match self {
            Value::Object(o) => Some(o),
            Value::Data(_) => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(&o.type_name()).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Data(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Data(serde_json::Value::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Data(serde_json::Value::String(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Data(serde_json::Value::String(v))
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Data(serde_json::Value::from(v))
    }
}

/// A link attached to a package description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    /// Relationship of the target, e.g. `installationmedia`.
    pub relationship: String,
    #[serde(default)]
    pub media_type: Option<String>,
    /// Links sharing an artifact group are installed together.
    #[serde(default)]
    pub artifact: Option<String>,
}

/// Package description produced by package-provider operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareIdentity {
    /// Provider-specific reference that round-trips back into the provider.
    pub fast_package_reference: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub version_scheme: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub search_key: Option<String>,
    #[serde(default)]
    pub full_path: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SoftwareIdentity {
    /// Parses `version` as a four-part version, if it is one.
    pub fn four_part_version(&self) -> Option<FourPartVersion> {
        self.version.parse().ok()
    }
}
