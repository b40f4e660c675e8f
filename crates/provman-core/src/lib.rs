// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the provman provider framework.
//!
//! This crate holds the pieces every other crate agrees on: the error
//! taxonomy, the value model that crosses the adapter boundary, the host
//! callback API, module manifests, and the traits at each seam.

pub mod error;
pub mod host;
pub mod manifest;
pub mod traits;
pub mod types;

pub use error::{ProvmanError, Result};
pub use host::{BootstrapPrompt, HostApi, HostHandle, OptionOverlay};
pub use manifest::{MemberDecl, ModuleManifest, ModuleResources, TypeDecl, SIDECAR_SUFFIX};
pub use traits::{
    callable, Callable, CandidateObject, CandidateType, DownloadTransport, HashAlgorithm,
    HashVerifier, LoadedModule, ModuleLoader, TrustVerifier,
};
pub use types::{
    FourPartVersion, Link, MemberForm, MemberInfo, MemberSignature, ProviderCategory,
    SoftwareIdentity, Value, ValueKind,
};
