// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams of the framework.
//!
//! [`CandidateObject`] and [`CandidateType`] are the reflection surface the
//! adapter reads. [`ModuleLoader`] turns a module path into candidate types.
//! The transfer traits are the collaborators the bootstrap provider calls.

pub mod candidate;
pub mod module;
pub mod transfer;

pub use candidate::{callable, Callable, CandidateObject, CandidateType};
pub use module::{LoadedModule, ModuleLoader};
pub use transfer::{DownloadTransport, HashAlgorithm, HashVerifier, TrustVerifier};
