// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module loading seam.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::manifest::ModuleManifest;
use crate::traits::candidate::CandidateType;
use crate::types::FourPartVersion;

/// Opens modules of one kind (builtin, sandboxed, ...).
#[async_trait]
pub trait ModuleLoader: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this loader understands the given path.
    fn handles(&self, path: &Path) -> bool;

    /// Loads the module. The manifest is the sidecar found by discovery.
    async fn load(
        &self,
        path: &Path,
        manifest: Option<&ModuleManifest>,
    ) -> Result<Arc<dyn LoadedModule>>;
}

/// A successfully opened module.
pub trait LoadedModule: Send + Sync {
    fn path(&self) -> &Path;

    /// Module version, used when a provider reports none.
    fn version(&self) -> Option<FourPartVersion>;

    fn public_types(&self) -> Vec<Arc<dyn CandidateType>>;
}
