// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the provman provider framework.
//!
//! Most of these errors never escape the loader: a failure local to one
//! module or one candidate is logged, reported to the host, and the scan
//! continues. Only argument errors at public entry points are surfaced to
//! callers as hard failures.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across all provman crates.
#[derive(Debug, Error)]
pub enum ProvmanError {
    /// A module could not be opened, compiled, or enumerated.
    #[error("failed to load module {path}: {message}")]
    ModuleLoad { path: PathBuf, message: String },

    /// A candidate cannot be adapted to a contract.
    #[error("type `{type_name}` is incompatible with contract `{contract}`: {message}")]
    IncompatibleType {
        contract: String,
        type_name: String,
        message: String,
    },

    /// A provider failed during `initialize_provider` or construction.
    #[error("provider `{provider}` failed to initialize: {message}")]
    Initialization { provider: String, message: String },

    /// A forwarded call into a candidate failed (error, trap, or panic).
    #[error("call to `{member}` failed: {message}")]
    Invocation { member: String, message: String },

    /// No bootstrap path exists for the requested provider.
    #[error("bootstrap unavailable for `{0}`")]
    BootstrapUnavailable(String),

    /// Transport-level download failure.
    #[error("download of {uri} failed: {message}")]
    Download { uri: String, message: String },

    /// Downloaded content failed hash or trust verification.
    #[error("verification failed for {path}: {message}")]
    Verification { path: PathBuf, message: String },

    /// Configuration errors (invalid TOML, bad feed URL, invalid manifest).
    #[error("configuration error: {0}")]
    Config(String),

    /// Programmer error at a public entry point.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem errors while scanning, hashing, or installing.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = ProvmanError> = std::result::Result<T, E>;
