// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider acquisition from a single module.
//!
//! Loads the module, filters its public types against each contract,
//! constructs and adapts the compatible ones, and initializes them. Every
//! candidate is isolated: a failure is logged, reported to the host, and
//! the remaining candidates are still processed.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use provman_adapter::{ProviderContract, StructuralAdapter};
use provman_core::{
    CandidateObject, CandidateType, FourPartVersion, HostHandle, LoadedModule, ModuleLoader,
    ProviderCategory, ProvmanError, Result,
};

use crate::discovery::ModuleCandidate;
use crate::providers::{Archiver, Downloader, MetaProvider, PackageProvider, ProviderHandle};

/// Categories a module type can implement directly.
const DIRECT_CATEGORIES: [ProviderCategory; 3] = [
    ProviderCategory::PackageProvider,
    ProviderCategory::Archiver,
    ProviderCategory::Downloader,
];

fn name_member(category: ProviderCategory) -> &'static str {
    match category {
        ProviderCategory::PackageProvider => "get_package_provider_name",
        ProviderCategory::Archiver => "get_archiver_name",
        ProviderCategory::Downloader => "get_downloader_name",
        ProviderCategory::MetaProvider => "get_meta_provider_name",
    }
}

/// Providers produced by one module, not yet registered.
#[derive(Debug, Default)]
pub struct AcquiredProviders {
    pub package_providers: Vec<PackageProvider>,
    pub archivers: Vec<Archiver>,
    pub downloaders: Vec<Downloader>,
    pub meta_providers: Vec<MetaProvider>,
}

impl AcquiredProviders {
    fn push(&mut self, category: ProviderCategory, handle: ProviderHandle) {
        match category {
            ProviderCategory::PackageProvider => {
                self.package_providers.push(PackageProvider::new(handle))
            }
            ProviderCategory::Archiver => self.archivers.push(Archiver::new(handle)),
            ProviderCategory::Downloader => self.downloaders.push(Downloader::new(handle)),
            ProviderCategory::MetaProvider => self.meta_providers.push(MetaProvider::new(handle)),
        }
    }

    pub fn extend(&mut self, other: AcquiredProviders) {
        self.package_providers.extend(other.package_providers);
        self.archivers.extend(other.archivers);
        self.downloaders.extend(other.downloaders);
        self.meta_providers.extend(other.meta_providers);
    }

    pub fn len(&self) -> usize {
        self.package_providers.len()
            + self.archivers.len()
            + self.downloaders.len()
            + self.meta_providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a provider came from, carried into its registry record.
#[derive(Debug, Clone)]
struct Origin {
    module_path: PathBuf,
    bundled: bool,
    module_version: Option<FourPartVersion>,
}

pub struct ProviderLoader {
    adapter: Arc<StructuralAdapter>,
    loaders: Vec<Arc<dyn ModuleLoader>>,
}

impl ProviderLoader {
    pub fn new(loaders: Vec<Arc<dyn ModuleLoader>>) -> Self {
        Self {
            adapter: Arc::new(StructuralAdapter::new()),
            loaders,
        }
    }

    pub fn adapter(&self) -> &Arc<StructuralAdapter> {
        &self.adapter
    }

    /// Loads a module with the first loader that accepts its path.
    pub async fn load_module(&self, candidate: &ModuleCandidate) -> Result<Arc<dyn LoadedModule>> {
        let loader = self
            .loaders
            .iter()
            .find(|l| l.handles(&candidate.path))
            .ok_or_else(|| ProvmanError::ModuleLoad {
                path: candidate.path.clone(),
                message: "no module loader accepts this path".to_string(),
            })?;
        debug!(module = %candidate.path.display(), loader = loader.name(), "loading module");
        loader.load(&candidate.path, candidate.manifest.as_ref()).await
    }

    /// Loads `candidate` and returns every provider it yields, initialized.
    ///
    /// Fails only when the module itself cannot be loaded.
    pub async fn acquire_providers(
        &self,
        candidate: &ModuleCandidate,
        host: &HostHandle,
    ) -> Result<AcquiredProviders> {
        let module = self.load_module(candidate).await?;
        let origin = Origin {
            module_path: candidate.path.clone(),
            bundled: candidate.bundled,
            module_version: module
                .version()
                .or_else(|| candidate.manifest.as_ref().map(|m| m.version)),
        };

        let mut acquired = AcquiredProviders::default();
        let types = module.public_types();
        for ty in &types {
            if !ty.has_default_constructor() {
                continue;
            }
            for category in DIRECT_CATEGORIES {
                let contract = ProviderContract::for_category(category);
                if !self.adapter.is_compatible(contract, std::slice::from_ref(ty)) {
                    continue;
                }
                if let Some(handle) = self.instantiate_type(ty, category, &origin, host).await {
                    acquired.push(category, handle);
                }
            }
        }

        // Meta-providers are enumerated independently of the direct contracts.
        for ty in &types {
            let contract = ProviderContract::meta_provider();
            if !ty.has_default_constructor()
                || !self.adapter.is_compatible(contract, std::slice::from_ref(ty))
            {
                continue;
            }
            let Some(handle) = self
                .instantiate_type(ty, ProviderCategory::MetaProvider, &origin, host)
                .await
            else {
                continue;
            };
            let meta = MetaProvider::new(handle);
            acquired.extend(self.acquire_via_meta(&meta, host).await);
            acquired.meta_providers.push(meta);
        }

        info!(
            module = %candidate.path.display(),
            providers = acquired.len(),
            "acquired providers from module"
        );
        Ok(acquired)
    }

    /// Creates every provider `meta` can name.
    pub async fn acquire_via_meta(&self, meta: &MetaProvider, host: &HostHandle) -> AcquiredProviders {
        let mut acquired = AcquiredProviders::default();
        let names = match meta.provider_names(host).await {
            Ok(names) => names,
            Err(e) => {
                warn!(meta_provider = %meta.name, error = %e, "listing provider names failed");
                host.warning(&format!("Meta-provider '{}' failed to list providers: {e}", meta.name));
                return acquired;
            }
        };
        for name in names {
            acquired.extend(self.load_via_meta(meta, &name, host).await);
        }
        acquired
    }

    /// Creates one named provider through `meta` and adapts it to every
    /// direct contract it satisfies.
    pub async fn load_via_meta(
        &self,
        meta: &MetaProvider,
        name: &str,
        host: &HostHandle,
    ) -> AcquiredProviders {
        let mut acquired = AcquiredProviders::default();
        let object = match meta.create_provider(name, host).await {
            Ok(Some(object)) => object,
            Ok(None) => {
                debug!(meta_provider = %meta.name, provider = name, "meta-provider returned nothing");
                return acquired;
            }
            Err(e) => {
                warn!(meta_provider = %meta.name, provider = name, error = %e, "create_provider failed");
                host.warning(&format!(
                    "Meta-provider '{}' failed to create '{name}': {e}",
                    meta.name
                ));
                return acquired;
            }
        };

        let origin = Origin {
            module_path: meta.module_path.clone(),
            bundled: meta.bundled,
            module_version: Some(meta.version),
        };
        for category in DIRECT_CATEGORIES {
            let contract = ProviderContract::for_category(category);
            let instances = [object.clone()];
            if !self.adapter.can_adapt(contract, &instances) {
                continue;
            }
            if let Some(handle) = self.adapt_instance(&instances, category, &origin, host).await {
                acquired.push(category, handle);
            }
        }
        acquired
    }

    async fn instantiate_type(
        &self,
        ty: &Arc<dyn CandidateType>,
        category: ProviderCategory,
        origin: &Origin,
        host: &HostHandle,
    ) -> Option<ProviderHandle> {
        // Constructors are synchronous; keep a slow one off the loader pool.
        let factory = Arc::clone(ty);
        let instance = match tokio::task::spawn_blocking(move || factory.construct()).await {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => {
                warn!(type_name = ty.name(), error = %e, "failed to construct candidate");
                return None;
            }
            Err(e) if e.is_panic() => {
                warn!(type_name = ty.name(), "candidate constructor panicked");
                return None;
            }
            Err(e) => {
                warn!(type_name = ty.name(), error = %e, "candidate constructor did not complete");
                return None;
            }
        };
        self.adapt_instance(&[instance], category, origin, host).await
    }

    /// Adapts, initializes, and names a provider instance.
    async fn adapt_instance(
        &self,
        instances: &[Arc<dyn CandidateObject>],
        category: ProviderCategory,
        origin: &Origin,
        host: &HostHandle,
    ) -> Option<ProviderHandle> {
        let contract = ProviderContract::for_category(category);
        let proxy = match self.adapter.build_adapter(contract, instances) {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!(contract = contract.name(), error = %e, "failed to adapt candidate");
                return None;
            }
        };
        let type_name = proxy.candidate_types().join("+");

        if let Err(e) = proxy
            .invoke("initialize_provider", vec![], host.clone())
            .await
        {
            warn!(
                type_name = %type_name,
                module = %origin.module_path.display(),
                error = %e,
                "provider failed to initialize"
            );
            host.warning(&format!("Provider '{type_name}' failed to initialize: {e}"));
            return None;
        }

        let name = match proxy
            .call_string(name_member(category), vec![], host.clone())
            .await
        {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => {
                debug!(type_name = %type_name, "provider reported no name, skipping");
                return None;
            }
            Err(e) => {
                warn!(type_name = %type_name, error = %e, "failed to read provider name");
                return None;
            }
        };

        let reported = proxy
            .call_string("get_provider_version", vec![], host.clone())
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse::<FourPartVersion>().ok())
            .filter(|v| !v.is_zero());
        let version = reported
            .or(origin.module_version)
            .unwrap_or(FourPartVersion::FALLBACK);

        debug!(
            category = %category,
            provider = %name,
            version = %version,
            module = %origin.module_path.display(),
            "provider ready"
        );
        Some(ProviderHandle {
            name,
            version,
            module_path: origin.module_path.clone(),
            bundled: origin.bundled,
            proxy: Arc::new(proxy),
        })
    }
}
