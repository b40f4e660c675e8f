// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builtin modules compiled into the host.
//!
//! A builtin module is addressed by a pseudo-path `builtin:<name>` and
//! needs no manifest. Its types are closure-backed candidates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use provman_core::{
    CandidateType, FourPartVersion, LoadedModule, ModuleLoader, ModuleManifest, ProvmanError,
    Result,
};

/// Path prefix marking a builtin module.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Returns the builtin module name if `path` is a builtin pseudo-path.
pub fn builtin_name(path: &Path) -> Option<&str> {
    path.to_str()?.strip_prefix(BUILTIN_PREFIX)
}

pub fn is_builtin(path: &Path) -> bool {
    builtin_name(path).is_some()
}

/// A module whose types are supplied by the host itself.
pub struct BuiltinModule {
    path: PathBuf,
    version: FourPartVersion,
    types: Vec<Arc<dyn CandidateType>>,
}

impl BuiltinModule {
    pub fn new(name: &str, version: FourPartVersion, types: Vec<Arc<dyn CandidateType>>) -> Self {
        Self {
            path: PathBuf::from(format!("{BUILTIN_PREFIX}{name}")),
            version,
            types,
        }
    }
}

impl LoadedModule for BuiltinModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> Option<FourPartVersion> {
        Some(self.version)
    }

    fn public_types(&self) -> Vec<Arc<dyn CandidateType>> {
        self.types.clone()
    }
}

/// Serves registered builtin modules by name.
#[derive(Default)]
pub struct BuiltinModuleLoader {
    modules: HashMap<String, Arc<BuiltinModule>>,
}

impl BuiltinModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module: BuiltinModule) -> Self {
        let name = builtin_name(&module.path)
            .unwrap_or_default()
            .to_lowercase();
        self.modules.insert(name, Arc::new(module));
        self
    }

    fn lookup(&self, path: &Path) -> Option<&Arc<BuiltinModule>> {
        builtin_name(path).and_then(|n| self.modules.get(&n.to_lowercase()))
    }
}

#[async_trait]
impl ModuleLoader for BuiltinModuleLoader {
    fn name(&self) -> &str {
        "builtin"
    }

    fn handles(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    async fn load(
        &self,
        path: &Path,
        _manifest: Option<&ModuleManifest>,
    ) -> Result<Arc<dyn LoadedModule>> {
        let module = self.lookup(path).ok_or_else(|| ProvmanError::ModuleLoad {
            path: path.to_path_buf(),
            message: "unknown builtin module".to_string(),
        })?;
        debug!(module = %path.display(), types = module.types.len(), "loaded builtin module");
        Ok(module.clone() as Arc<dyn LoadedModule>)
    }
}
