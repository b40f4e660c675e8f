// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module discovery.
//!
//! Builds the ordered list of module paths to load: bundled modules, then
//! machine-scope registrations, then user-scope registrations, then every
//! module file found in the scanned directories. Modules outside the
//! builtin set must carry an applicable sidecar manifest. Same-named
//! modules (by file stem) collapse to the highest manifest version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use provman_config::DiscoveryConfig;
use provman_core::{HostHandle, ModuleManifest};

use crate::builtin::{builtin_name, is_builtin};
use crate::manifest::{read_sidecar, SIDECAR_SUFFIX};

/// A module path that survived filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCandidate {
    pub path: PathBuf,
    /// `None` for builtin modules.
    pub manifest: Option<ModuleManifest>,
    /// Whether the path came from the bundled module list.
    pub bundled: bool,
}

impl ModuleCandidate {
    /// Case-folded identity used for deduplication.
    pub fn stem(&self) -> String {
        module_stem(&self.path)
    }
}

fn module_stem(path: &Path) -> String {
    if let Some(name) = builtin_name(path) {
        return name.to_lowercase();
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub struct ModuleDiscovery {
    config: DiscoveryConfig,
    host_dir: Option<PathBuf>,
    host_version: semver::Version,
    os: String,
}

impl ModuleDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        let host_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            config,
            host_dir,
            host_version: semver::Version::parse(env!("CARGO_PKG_VERSION"))
                .unwrap_or_else(|_| semver::Version::new(0, 0, 0)),
            os: std::env::consts::OS.to_string(),
        }
    }

    /// Overrides the directory of the running host binary.
    pub fn with_host_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.host_dir = dir;
        self
    }

    pub fn with_host_version(mut self, version: semver::Version) -> Self {
        self.host_version = version;
        self
    }

    /// Directories scanned for module files, in priority order.
    pub fn scan_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if self.config.scan_host_dir {
            dirs.extend(self.host_dir.clone());
        }
        dirs.extend(self.config.user_extension_dir.clone());
        dirs.extend(self.config.machine_extension_dir.clone());
        dirs
    }

    /// Produces the filtered, deduplicated candidate list.
    pub async fn discover(&self, include_bundled: bool, host: &HostHandle) -> Vec<ModuleCandidate> {
        let mut raw: Vec<(PathBuf, bool)> = Vec::new();
        if include_bundled {
            raw.extend(self.config.bundled_modules.iter().map(|p| (PathBuf::from(p), true)));
        }
        raw.extend(self.config.machine_modules.iter().map(|p| (PathBuf::from(p), false)));
        raw.extend(self.config.user_modules.iter().map(|p| (PathBuf::from(p), false)));
        for dir in self.scan_dirs() {
            raw.extend(self.scan_dir(&dir).await.into_iter().map(|p| (p, false)));
        }

        let mut candidates = Vec::new();
        for (path, bundled) in raw {
            if let Some(candidate) = self.filter(path, bundled, host).await {
                candidates.push(candidate);
            }
        }
        dedup_highest_version(candidates)
    }

    async fn filter(&self, path: PathBuf, bundled: bool, host: &HostHandle) -> Option<ModuleCandidate> {
        if is_builtin(&path) {
            return Some(ModuleCandidate {
                path,
                manifest: None,
                bundled,
            });
        }

        match read_sidecar(&path).await {
            Ok(Some(manifest)) if manifest.is_applicable(&self.host_version, &self.os) => {
                Some(ModuleCandidate {
                    path,
                    manifest: Some(manifest),
                    bundled,
                })
            }
            Ok(Some(manifest)) => {
                debug!(
                    module = %path.display(),
                    host_version = ?manifest.host_version,
                    platforms = ?manifest.platforms,
                    "module not applicable to this host"
                );
                None
            }
            Ok(None) => {
                debug!(module = %path.display(), "module has no manifest, skipping");
                None
            }
            Err(e) => {
                warn!(module = %path.display(), error = %e, "unreadable module manifest");
                host.verbose(&format!("Skipping {}: {e}", path.display()));
                None
            }
        }
    }

    async fn scan_dir(&self, dir: &Path) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "extension directory not readable");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if self.is_module_file(&path) {
                found.push(path);
            }
        }
        found.sort();
        found
    }

    fn is_module_file(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.ends_with(SIDECAR_SUFFIX) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.config
                    .module_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// Keeps one candidate per stem: the highest manifest version, placed at
/// the position of the first candidate with that stem. A builtin module is
/// never replaced.
pub fn dedup_highest_version(candidates: Vec<ModuleCandidate>) -> Vec<ModuleCandidate> {
    let mut out: Vec<ModuleCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let stem = candidate.stem();
        match index.get(&stem) {
            Some(&i) if is_builtin(&out[i].path) => {
                debug!(
                    stem = %stem,
                    ignored = %candidate.path.display(),
                    "builtin module shadows module file with the same name"
                );
            }
            Some(&i) => {
                let current = out[i].manifest.as_ref().map(|m| m.version);
                let incoming = candidate.manifest.as_ref().map(|m| m.version);
                if incoming > current {
                    debug!(
                        stem = %stem,
                        replaced = %out[i].path.display(),
                        by = %candidate.path.display(),
                        "newer module version supersedes earlier one"
                    );
                    out[i] = candidate;
                }
            }
            None => {
                index.insert(stem, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use provman_test_utils::{write_module_file, RecordingHost};

    fn config(dir: &Path) -> DiscoveryConfig {
        DiscoveryConfig {
            bundled_modules: vec!["builtin:core".into()],
            machine_modules: vec![],
            user_modules: vec![],
            machine_extension_dir: None,
            user_extension_dir: Some(dir.to_path_buf()),
            scan_host_dir: false,
            module_extensions: vec!["wasm".into()],
        }
    }

    #[tokio::test]
    async fn bundled_first_then_scanned() {
        let dir = tempfile::tempdir().unwrap();
        write_module_file(dir.path(), "foo", "wasm", "1.0", b"foo");
        let host = RecordingHost::new().handle();

        let found = ModuleDiscovery::new(config(dir.path()))
            .discover(true, &host)
            .await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, PathBuf::from("builtin:core"));
        assert!(found[0].bundled);
        assert!(found[0].manifest.is_none());
        assert_eq!(found[1].stem(), "foo");
    }

    #[tokio::test]
    async fn bundled_modules_can_be_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let host = RecordingHost::new().handle();
        let found = ModuleDiscovery::new(config(dir.path()))
            .discover(false, &host)
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn modules_without_manifest_or_wrong_extension_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bare.wasm"), b"x").unwrap();
        write_module_file(dir.path(), "other", "so", "1.0", b"x");
        let host = RecordingHost::new().handle();

        let found = ModuleDiscovery::new(config(dir.path()))
            .discover(false, &host)
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn inapplicable_host_version_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("future.wasm"), b"x").unwrap();
        std::fs::write(
            dir.path().join("future.provider.toml"),
            "[provider]\nname = \"future\"\nversion = \"1\"\nhost_version = \">=99\"\n",
        )
        .unwrap();
        let host = RecordingHost::new().handle();

        let found = ModuleDiscovery::new(config(dir.path()))
            .with_host_version(semver::Version::new(0, 1, 0))
            .discover(false, &host)
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn same_stem_keeps_highest_version_in_first_position() {
        let user = tempfile::tempdir().unwrap();
        let machine = tempfile::tempdir().unwrap();
        let old = write_module_file(user.path(), "Foo", "wasm", "1.0", b"old");
        let new = write_module_file(machine.path(), "foo", "wasm", "2.0", b"new");
        let bar = write_module_file(user.path(), "bar", "wasm", "1.0", b"bar");

        let mut cfg = config(user.path());
        cfg.bundled_modules.clear();
        cfg.user_modules = vec![old.display().to_string()];
        cfg.machine_modules = vec![new.display().to_string()];
        cfg.user_extension_dir = None;
        cfg.machine_extension_dir = Some(user.path().to_path_buf());
        let host = RecordingHost::new().handle();

        let found = ModuleDiscovery::new(cfg).discover(false, &host).await;
        let paths: Vec<&Path> = found.iter().map(|c| c.path.as_path()).collect();
        assert_eq!(paths, vec![new.as_path(), bar.as_path()]);
    }

    #[tokio::test]
    async fn module_file_does_not_replace_builtin_with_same_name() {
        let dir = tempfile::tempdir().unwrap();
        write_module_file(dir.path(), "core", "wasm", "99.0", b"core");
        write_module_file(dir.path(), "foo", "wasm", "1.0", b"foo");
        let host = RecordingHost::new().handle();

        let found = ModuleDiscovery::new(config(dir.path()))
            .discover(true, &host)
            .await;
        let stems: Vec<String> = found.iter().map(ModuleCandidate::stem).collect();
        assert_eq!(stems, vec!["core", "foo"]);
        assert_eq!(found[0].path, PathBuf::from("builtin:core"));
        assert!(found[0].bundled);
    }
}
