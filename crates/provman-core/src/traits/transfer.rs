// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Download and verification collaborators used by the bootstrap provider.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;
use crate::host::HostHandle;

/// Content hash algorithms accepted in catalog entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    /// Accepted for older catalogs only.
    Sha1,
}

impl HashAlgorithm {
    pub fn is_legacy(self) -> bool {
        matches!(self, HashAlgorithm::Sha1)
    }
}

/// Fetches a remote file onto local disk.
#[async_trait]
pub trait DownloadTransport: Send + Sync + 'static {
    /// Downloads `uri` to `destination`, reporting progress to the host
    /// when `show_progress` is set.
    ///
    /// Returns `Ok(None)` when the remote answered but had nothing to give
    /// (e.g. a 404), and `Err` for transport failures and rejected schemes.
    async fn download(
        &self,
        uri: &str,
        destination: &Path,
        timeout: Duration,
        show_progress: bool,
        host: &HostHandle,
    ) -> Result<Option<PathBuf>>;
}

/// Computes file digests.
#[async_trait]
pub trait HashVerifier: Send + Sync + 'static {
    async fn compute_hash(&self, algorithm: HashAlgorithm, path: &Path) -> Result<Vec<u8>>;
}

/// Pass/fail signature oracle.
#[async_trait]
pub trait TrustVerifier: Send + Sync + 'static {
    async fn is_signed_and_trusted(&self, path: &Path, host: &HostHandle) -> bool;
}
