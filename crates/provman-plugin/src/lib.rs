// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider discovery, loading and management.
//!
//! - [`discovery`] builds the ordered, filtered list of module paths.
//! - [`builtin`] and [`wasm`] turn a path into a loaded module.
//! - [`loader`] adapts a module's public types into typed providers.
//! - [`registry`] keeps the highest version of each provider by name.
//! - [`service`] ties these together as [`ProviderManager`], including the
//!   bootstrap fallback for missing providers.

pub mod builtin;
pub mod discovery;
pub mod guard;
pub mod loader;
pub mod manifest;
pub mod providers;
pub mod registry;
pub mod service;
pub mod wasm;

pub use builtin::{BuiltinModule, BuiltinModuleLoader, BUILTIN_PREFIX};
pub use discovery::{ModuleCandidate, ModuleDiscovery};
pub use guard::CallContext;
pub use loader::{AcquiredProviders, ProviderLoader};
pub use manifest::{parse_module_manifest, read_sidecar, SIDECAR_SUFFIX};
pub use providers::{Archiver, Downloader, Features, MetaProvider, PackageProvider, ProviderHandle};
pub use registry::{CategoryMap, ProviderRegistry, RegisterOutcome};
pub use service::{LoadSummary, ProviderManager, ProviderManagerBuilder, BOOTSTRAP_PROVIDER};
pub use wasm::WasmModuleLoader;
