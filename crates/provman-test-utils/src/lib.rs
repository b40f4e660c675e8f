// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for provman integration tests.
//!
//! Provides hosts, transports, and module loaders that run without a
//! network, a terminal, or real provider modules.
//!
//! # Components
//!
//! - [`RecordingHost`] - Host that records diagnostics and answers prompts
//! - [`ScriptedTransport`] - Download transport with queued responses
//! - [`InMemoryModuleLoader`] - Loader serving closure-backed types by path
//! - [`FakeBootstrap`] - Stand-in for the builtin Bootstrap provider

pub mod fixtures;
pub mod host;
pub mod module;
pub mod transport;

pub use fixtures::{
    archiver_type, failing_init_provider_type, meta_provider_type, package_provider,
    package_provider_type, package_provider_type_with_features, FakeBootstrap,
};
pub use host::RecordingHost;
pub use module::{write_module_file, InMemoryModuleLoader};
pub use transport::ScriptedTransport;
