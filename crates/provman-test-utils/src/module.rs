// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory module loader and on-disk module fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use provman_core::{
    CandidateType, FourPartVersion, LoadedModule, ModuleLoader, ModuleManifest, ProvmanError,
    Result,
};

#[derive(Clone)]
struct InMemoryModule {
    path: PathBuf,
    version: Option<FourPartVersion>,
    types: Vec<Arc<dyn CandidateType>>,
}

impl LoadedModule for InMemoryModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> Option<FourPartVersion> {
        self.version
    }

    fn public_types(&self) -> Vec<Arc<dyn CandidateType>> {
        self.types.clone()
    }
}

/// A loader serving modules registered in memory, keyed by path.
///
/// Counts loads per path so tests can check deduplication.
#[derive(Default)]
pub struct InMemoryModuleLoader {
    modules: Mutex<HashMap<PathBuf, InMemoryModule>>,
    loads: Mutex<HashMap<PathBuf, usize>>,
}

impl InMemoryModuleLoader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers (or replaces) the module served at `path`.
    pub fn set_module(
        &self,
        path: impl Into<PathBuf>,
        version: Option<&str>,
        types: Vec<Arc<dyn CandidateType>>,
    ) {
        let path = path.into();
        let module = InMemoryModule {
            path: path.clone(),
            version: version.and_then(|v| v.parse().ok()),
            types,
        };
        self.modules.lock().unwrap().insert(path, module);
    }

    pub fn load_count(&self, path: &Path) -> usize {
        self.loads.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl ModuleLoader for InMemoryModuleLoader {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn handles(&self, path: &Path) -> bool {
        self.modules.lock().unwrap().contains_key(path)
    }

    async fn load(
        &self,
        path: &Path,
        _manifest: Option<&ModuleManifest>,
    ) -> Result<Arc<dyn LoadedModule>> {
        *self
            .loads
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default() += 1;
        let module = self
            .modules
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ProvmanError::ModuleLoad {
                path: path.to_path_buf(),
                message: "no in-memory module at this path".to_string(),
            })?;
        Ok(Arc::new(module))
    }
}

/// Writes a module file and its `<stem>.provider.toml` sidecar into `dir`.
///
/// Returns the module path. `content` makes the file hash distinct.
pub fn write_module_file(
    dir: &Path,
    stem: &str,
    extension: &str,
    version: &str,
    content: &[u8],
) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{stem}.{extension}"));
    std::fs::write(&path, content).unwrap();
    let sidecar = dir.join(format!("{stem}.provider.toml"));
    std::fs::write(
        sidecar,
        format!("[provider]\nname = \"{stem}\"\nversion = \"{version}\"\n"),
    )
    .unwrap();
    path
}
