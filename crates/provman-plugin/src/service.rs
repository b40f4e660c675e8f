// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The provider management service.
//!
//! [`ProviderManager`] owns the registry and drives discovery, loading and
//! registration. It also runs the bootstrap fallback: when a named package
//! provider is missing, the registered "Bootstrap" provider may install it
//! after the host confirms, and the registry is reloaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use provman_config::ProvmanConfig;
use provman_core::{
    BootstrapPrompt, FourPartVersion, HostHandle, ModuleLoader, OptionOverlay, ProvmanError,
    Result, SoftwareIdentity,
};

use crate::builtin::is_builtin;
use crate::discovery::{ModuleCandidate, ModuleDiscovery};
use crate::guard::CallContext;
use crate::loader::{AcquiredProviders, ProviderLoader};
use crate::providers::{Archiver, Downloader, MetaProvider, PackageProvider};
use crate::registry::ProviderRegistry;

/// Name of the provider that installs other providers.
pub const BOOTSTRAP_PROVIDER: &str = "Bootstrap";

/// Host option carrying the install destination to the Bootstrap provider.
pub const DESTINATION_OPTION: &str = "destination";

const INSTALLATION_MEDIA: &str = "installationmedia";

/// Counts from one `load_providers` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub modules_seen: usize,
    pub modules_loaded: usize,
    /// Byte-identical to a module already loaded.
    pub modules_unchanged: usize,
    pub modules_failed: usize,
    /// Registrations that added or replaced a provider.
    pub providers_registered: usize,
}

enum ModuleOutcome {
    Loaded { registered: usize },
    Unchanged,
    Failed,
}

/// Builder for [`ProviderManager`].
pub struct ProviderManagerBuilder {
    config: ProvmanConfig,
    loaders: Vec<Arc<dyn ModuleLoader>>,
    host_dir: Option<Option<PathBuf>>,
    host_version: Option<semver::Version>,
}

impl ProviderManagerBuilder {
    /// Adds a module loader. Loaders are tried in the order added.
    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Overrides the host directory scanned for modules.
    pub fn host_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.host_dir = Some(dir);
        self
    }

    pub fn host_version(mut self, version: semver::Version) -> Self {
        self.host_version = Some(version);
        self
    }

    pub fn build(self) -> ProviderManager {
        let mut discovery = ModuleDiscovery::new(self.config.discovery.clone());
        if let Some(dir) = self.host_dir {
            discovery = discovery.with_host_dir(dir);
        }
        if let Some(version) = self.host_version {
            discovery = discovery.with_host_version(version);
        }

        ProviderManager {
            config: self.config,
            discovery,
            loader: ProviderLoader::new(self.loaders),
            registry: ProviderRegistry::new(),
            loaded_hashes: DashMap::new(),
            bundled_loaded: AtomicBool::new(false),
            call_context: CallContext::new(),
        }
    }
}

/// Owns the provider registry and every operation over it.
pub struct ProviderManager {
    config: ProvmanConfig,
    discovery: ModuleDiscovery,
    loader: ProviderLoader,
    registry: Arc<ProviderRegistry>,
    /// Module path to the SHA-256 of the content last loaded from it.
    loaded_hashes: DashMap<PathBuf, String>,
    bundled_loaded: AtomicBool,
    call_context: CallContext,
}

impl ProviderManager {
    pub fn builder(config: ProvmanConfig) -> ProviderManagerBuilder {
        ProviderManagerBuilder {
            config,
            loaders: Vec::new(),
            host_dir: None,
            host_version: None,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Discovers and loads every module, registering the providers found.
    ///
    /// Bundled modules are only included on the first call. A module whose
    /// content has not changed since it was last loaded is skipped.
    pub async fn load_providers(&self, host: &HostHandle) -> LoadSummary {
        let include_bundled = !self.bundled_loaded.swap(true, Ordering::SeqCst);
        let candidates = self.discovery.discover(include_bundled, host).await;
        let workers = self.config.loader.workers.max(1);

        let mut summary = LoadSummary {
            modules_seen: candidates.len(),
            ..Default::default()
        };
        let outcomes: Vec<ModuleOutcome> = stream::iter(candidates)
            .map(|candidate| self.process_module(candidate, host))
            .buffer_unordered(workers)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ModuleOutcome::Loaded { registered } => {
                    summary.modules_loaded += 1;
                    summary.providers_registered += registered;
                }
                ModuleOutcome::Unchanged => summary.modules_unchanged += 1,
                ModuleOutcome::Failed => summary.modules_failed += 1,
            }
        }

        info!(
            seen = summary.modules_seen,
            loaded = summary.modules_loaded,
            unchanged = summary.modules_unchanged,
            failed = summary.modules_failed,
            registered = summary.providers_registered,
            "provider load pass complete"
        );
        summary
    }

    async fn process_module(&self, candidate: ModuleCandidate, host: &HostHandle) -> ModuleOutcome {
        let fingerprint = if is_builtin(&candidate.path) {
            "builtin".to_string()
        } else {
            match file_sha256(&candidate.path).await {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(module = %candidate.path.display(), error = %e, "cannot hash module");
                    return ModuleOutcome::Failed;
                }
            }
        };

        if self
            .loaded_hashes
            .get(&candidate.path)
            .is_some_and(|h| *h == fingerprint)
        {
            debug!(module = %candidate.path.display(), "module unchanged, skipping");
            return ModuleOutcome::Unchanged;
        }

        match self.loader.acquire_providers(&candidate, host).await {
            Ok(acquired) => {
                self.loaded_hashes.insert(candidate.path.clone(), fingerprint);
                ModuleOutcome::Loaded {
                    registered: self.register_all(acquired),
                }
            }
            Err(e) => {
                warn!(module = %candidate.path.display(), error = %e, "failed to load module");
                host.verbose(&format!("Failed to load {}: {e}", candidate.path.display()));
                ModuleOutcome::Failed
            }
        }
    }

    fn register_all(&self, acquired: AcquiredProviders) -> usize {
        let mut registered = 0;
        for meta in acquired.meta_providers {
            registered += usize::from(self.registry.meta_providers.register(meta).is_registered());
        }
        for provider in acquired.package_providers {
            registered +=
                usize::from(self.registry.package_providers.register(provider).is_registered());
        }
        for archiver in acquired.archivers {
            registered += usize::from(self.registry.archivers.register(archiver).is_registered());
        }
        for downloader in acquired.downloaders {
            registered +=
                usize::from(self.registry.downloaders.register(downloader).is_registered());
        }
        registered
    }

    /// Package providers matching `pattern`.
    ///
    /// An empty pattern returns every provider. `*` and `?` make the pattern
    /// a case-insensitive wildcard over registered names. A plain name that
    /// is not registered triggers the bootstrap fallback once; if that does
    /// not produce the provider, the host gets one warning.
    pub async fn select_providers(
        &self,
        pattern: &str,
        host: &HostHandle,
    ) -> Result<Vec<PackageProvider>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(self.registry.package_providers.all());
        }

        if is_wildcard(pattern) {
            let matcher = wildcard_regex(pattern)?;
            return Ok(self
                .registry
                .package_providers
                .all()
                .into_iter()
                .filter(|p| matcher.is_match(&p.name))
                .collect());
        }

        if let Some(provider) = self.registry.package_providers.get(pattern) {
            return Ok(vec![provider]);
        }

        if host.is_interactive()
            && self
                .require_package_provider("", pattern, None, host)
                .await?
        {
            if let Some(provider) = self.registry.package_providers.get(pattern) {
                return Ok(vec![provider]);
            }
        }

        host.warning(&format!("Unknown provider '{pattern}'"));
        Ok(Vec::new())
    }

    /// Ensures a package provider named `name` is available, bootstrapping
    /// it if the host agrees.
    ///
    /// Returns `true` when an adequate version is (now) registered.
    pub async fn require_package_provider(
        &self,
        requestor: &str,
        name: &str,
        minimum_version: Option<FourPartVersion>,
        host: &HostHandle,
    ) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProvmanError::InvalidArgument(
                "provider name must not be empty".to_string(),
            ));
        }

        if let Some(existing) = self.registry.package_providers.get(name) {
            if minimum_version.is_none_or(|min| existing.version >= min) {
                return Ok(true);
            }
        }

        if !self.call_context.try_begin(host.call_count(), name) {
            debug!(provider = name, "bootstrap already attempted in this call");
            return Ok(false);
        }
        if !host.is_interactive() {
            debug!(provider = name, "host is not interactive, not bootstrapping");
            return Ok(false);
        }
        let Some(bootstrap) = self.registry.package_providers.get(BOOTSTRAP_PROVIDER) else {
            debug!(provider = name, "no Bootstrap provider registered");
            return Ok(false);
        };

        let minimum = minimum_version.map(|v| v.to_string()).unwrap_or_default();
        let found = match bootstrap.find_package(name, "", &minimum, "", host).await {
            Ok(found) => found,
            Err(e) => {
                warn!(provider = name, error = %e, "bootstrap catalog search failed");
                return Ok(false);
            }
        };

        let Some(chosen) = single_match(found) else {
            debug!(provider = name, "no unique bootstrap match");
            return Ok(false);
        };

        let destination = self
            .config
            .install_destination()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        let prompt = BootstrapPrompt {
            requestor: requestor.to_string(),
            provider_name: chosen.name.clone(),
            provider_version: chosen.version.clone(),
            provider_type: chosen
                .metadata
                .get("ProviderType")
                .cloned()
                .unwrap_or_else(|| "PackageProvider".to_string()),
            location: chosen
                .links
                .iter()
                .find(|l| l.relationship.eq_ignore_ascii_case(INSTALLATION_MEDIA))
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            destination: destination.clone(),
        };
        if !host.should_bootstrap_provider(&prompt).await {
            info!(provider = %chosen.name, "user declined bootstrap");
            return Ok(false);
        }

        let mut overlay = OptionOverlay::new(host.clone());
        if !destination.is_empty() {
            overlay = overlay.with_option(DESTINATION_OPTION, vec![destination]);
        }
        let install_host = overlay.into_handle();

        let installed = match bootstrap
            .install_package(&chosen.fast_package_reference, &install_host)
            .await
        {
            Ok(installed) => installed,
            Err(e) => {
                warn!(provider = %chosen.name, error = %e, "bootstrap install failed");
                host.warning(&format!("Failed to bootstrap provider '{}': {e}", chosen.name));
                return Ok(false);
            }
        };
        if installed.is_empty() {
            return Ok(false);
        }

        info!(provider = %chosen.name, version = %chosen.version, "bootstrapped provider");
        self.load_providers(host).await;
        Ok(true)
    }

    /// Names of the registered package providers.
    pub fn provider_names(&self) -> Vec<String> {
        self.registry.package_providers.names()
    }

    /// Registered names plus every name the Bootstrap catalog can install.
    pub async fn all_provider_names(&self, host: &HostHandle) -> Vec<String> {
        let mut names = self.provider_names();
        if let Some(bootstrap) = self.registry.package_providers.get(BOOTSTRAP_PROVIDER) {
            match bootstrap.find_package("", "", "", "", host).await {
                Ok(found) => names.extend(found.into_iter().map(|i| i.name)),
                Err(e) => debug!(error = %e, "bootstrap catalog unavailable"),
            }
        }
        names.sort_by_key(|n| n.to_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        names
    }

    /// Package providers declaring `feature`, optionally with `value`.
    pub async fn select_providers_with_feature(
        &self,
        feature: &str,
        value: Option<&str>,
        host: &HostHandle,
    ) -> Vec<PackageProvider> {
        let mut selected = Vec::new();
        for provider in self.registry.package_providers.all() {
            let features = match provider.features(host).await {
                Ok(features) => features,
                Err(e) => {
                    debug!(provider = %provider.name, error = %e, "get_features failed");
                    continue;
                }
            };
            let matched = features
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(feature))
                .is_some_and(|(_, values)| {
                    value.is_none_or(|v| values.iter().any(|x| x.eq_ignore_ascii_case(v)))
                });
            if matched {
                selected.push(provider);
            }
        }
        selected
    }

    /// Package providers that did not come from a bundled module.
    pub fn dynamic_providers(&self) -> Vec<PackageProvider> {
        self.registry
            .package_providers
            .all()
            .into_iter()
            .filter(|p| !p.bundled)
            .collect()
    }

    pub fn archivers(&self) -> Vec<Archiver> {
        self.registry.archivers.all()
    }

    pub fn downloaders(&self) -> Vec<Downloader> {
        self.registry.downloaders.all()
    }

    pub fn archiver(&self, name: &str) -> Option<Archiver> {
        self.registry.archivers.get(name)
    }

    pub fn downloader(&self, name: &str) -> Option<Downloader> {
        self.registry.downloaders.get(name)
    }

    pub fn meta_provider_names(&self) -> Vec<String> {
        self.registry.meta_providers.names()
    }

    /// Loads `name` through the registered meta-provider `meta_name` and
    /// registers what it yields.
    ///
    /// Returns `true` when a package provider named `name` is registered
    /// afterwards.
    pub async fn try_load_provider_via_meta_provider(
        &self,
        meta_name: &str,
        name: &str,
        host: &HostHandle,
    ) -> Result<bool> {
        if meta_name.trim().is_empty() || name.trim().is_empty() {
            return Err(ProvmanError::InvalidArgument(
                "meta-provider and provider names must not be empty".to_string(),
            ));
        }
        let Some(meta) = self.registry.meta_providers.get(meta_name) else {
            debug!(meta_provider = meta_name, "meta-provider not registered");
            return Ok(false);
        };
        let acquired = self.loader.load_via_meta(&meta, name, host).await;
        self.register_all(acquired);
        Ok(self.registry.package_providers.get(name).is_some())
    }

    /// The meta-provider registered under `name`.
    pub fn meta_provider(&self, name: &str) -> Option<MetaProvider> {
        self.registry.meta_providers.get(name)
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Case-insensitive, fully anchored regex for a `*`/`?` wildcard.
fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
        .map_err(|e| ProvmanError::InvalidArgument(format!("invalid pattern '{pattern}': {e}")))
}

/// The highest version of the single package name in `found`, if exactly
/// one name is present.
fn single_match(found: Vec<SoftwareIdentity>) -> Option<SoftwareIdentity> {
    let mut groups: BTreeMap<String, Vec<SoftwareIdentity>> = BTreeMap::new();
    for identity in found {
        groups
            .entry(identity.name.to_lowercase())
            .or_default()
            .push(identity);
    }
    if groups.len() != 1 {
        return None;
    }
    let (_, mut versions) = groups.pop_first()?;
    versions.sort_by_key(|i| std::cmp::Reverse(i.four_part_version().unwrap_or_default()));
    versions.into_iter().next()
}

async fn file_sha256(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
