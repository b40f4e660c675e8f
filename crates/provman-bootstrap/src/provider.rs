// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The builtin "Bootstrap" package provider.
//!
//! Its packages are other providers: `find_package` searches the remote
//! catalog and `install_package` downloads, verifies, and installs a
//! provider module into the destination directory. The manager reloads
//! its registry afterwards; this provider never registers anything itself.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value as Json};
use tracing::{info, warn};

use provman_adapter::{DynamicObject, DynamicType};
use provman_core::{
    CandidateType, FourPartVersion, HostHandle, MemberSignature, ProvmanError, Result,
    SoftwareIdentity, Value, ValueKind,
};

use crate::catalog::{CatalogSource, VersionFilter};
use crate::install::Installer;

/// Registered name of the bootstrap provider.
pub const BOOTSTRAP_PROVIDER_NAME: &str = "Bootstrap";

/// Host option naming the install directory.
pub const DESTINATION_OPTION: &str = "destination";

pub struct BootstrapProvider {
    catalog: Arc<CatalogSource>,
    installer: Arc<Installer>,
    default_destination: Option<PathBuf>,
    installed: Mutex<Vec<SoftwareIdentity>>,
}

impl BootstrapProvider {
    pub fn new(
        catalog: Arc<CatalogSource>,
        installer: Arc<Installer>,
        default_destination: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            installer,
            default_destination,
            installed: Mutex::new(Vec::new()),
        })
    }

    /// Exposes the provider as a default-constructible candidate type.
    ///
    /// Every constructed object shares this provider's state.
    pub fn candidate_type(self: &Arc<Self>) -> Result<Arc<dyn CandidateType>> {
        let provider = Arc::clone(self);
        let ty = DynamicType::new("BootstrapProvider", move || Ok(provider.object()))?;
        Ok(ty.into_arc())
    }

    fn object(self: &Arc<Self>) -> DynamicObject {
        use ValueKind::{Json as J, String as S, Unit};

        let find = Arc::clone(self);
        let install = Arc::clone(self);
        let installed = Arc::clone(self);

        DynamicObject::builder("BootstrapProvider")
            .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
                Ok(Value::unit())
            })
            .method("get_package_provider_name", MemberSignature::new([], S), |_, _| async {
                Ok(Value::from(BOOTSTRAP_PROVIDER_NAME))
            })
            .method("get_provider_version", MemberSignature::new([], S), |_, _| async {
                Ok(Value::from(env!("CARGO_PKG_VERSION")))
            })
            .method("get_features", MemberSignature::new([], J), |_, _| async {
                Ok(Value::from(json!({ "bootstrap": [] })))
            })
            .method("find_package", MemberSignature::new([S, S, S, S], J), move |args, host| {
                let provider = Arc::clone(&find);
                async move { provider.find_package(args, host).await }
            })
            .method("install_package", MemberSignature::new([S], J), move |args, host| {
                let provider = Arc::clone(&install);
                async move { provider.install_package(args, host).await }
            })
            .method("get_installed_packages", MemberSignature::new([S], J), move |args, _| {
                let provider = Arc::clone(&installed);
                async move { provider.installed_packages(args) }
            })
            .build()
    }

    async fn find_package(&self, args: Vec<Json>, host: HostHandle) -> Result<Value> {
        let name = arg_str(&args, 0).unwrap_or_default();
        let filter = VersionFilter {
            required: arg_version(&args, 1)?,
            minimum: arg_version(&args, 2)?,
            maximum: arg_version(&args, 3)?,
        };

        let catalog = match self.catalog.catalog(&host).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "provider catalog unavailable");
                return Ok(Value::from(json!([])));
            }
        };

        let found: Vec<SoftwareIdentity> = catalog
            .find(&name, filter)
            .into_iter()
            .map(|e| e.to_identity())
            .collect();
        to_json_value(&found)
    }

    async fn install_package(&self, args: Vec<Json>, host: HostHandle) -> Result<Value> {
        let reference = arg_str(&args, 0).ok_or_else(|| {
            ProvmanError::InvalidArgument("install_package needs a package reference".to_string())
        })?;

        let destination = host
            .option_values(DESTINATION_OPTION)
            .into_iter()
            .next()
            .map(PathBuf::from)
            .or_else(|| self.default_destination.clone())
            .ok_or_else(|| {
                ProvmanError::Config("no install destination is configured".to_string())
            })?;

        let catalog = self.catalog.catalog(&host).await?;
        let entry = catalog.get(&reference).ok_or_else(|| {
            ProvmanError::BootstrapUnavailable(format!("`{reference}` is not in the catalog"))
        })?;

        let files = self.installer.install_entry(entry, &destination, &host).await?;

        let mut identity = entry.to_identity();
        if let Some(first) = files.first() {
            identity.full_path = Some(first.display().to_string());
            identity.filename = first
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
        }
        info!(
            provider = %entry.name,
            version = %entry.version,
            destination = %destination.display(),
            "provider installed"
        );

        if let Ok(mut installed) = self.installed.lock() {
            installed.push(identity.clone());
        }
        to_json_value(&[identity])
    }

    fn installed_packages(&self, args: Vec<Json>) -> Result<Value> {
        let name = arg_str(&args, 0).unwrap_or_default();
        let installed = self
            .installed
            .lock()
            .map_err(|_| ProvmanError::Internal("installed list poisoned".to_string()))?;
        let matching: Vec<&SoftwareIdentity> = installed
            .iter()
            .filter(|i| name.is_empty() || i.name.eq_ignore_ascii_case(&name))
            .collect();
        to_json_value(&matching)
    }
}

fn arg_str(args: &[Json], index: usize) -> Option<String> {
    args.get(index)
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn arg_version(args: &[Json], index: usize) -> Result<Option<FourPartVersion>> {
    arg_str(args, index).map(|s| s.parse()).transpose()
}

fn to_json_value<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map(Value::from)
        .map_err(|e| ProvmanError::Internal(format!("failed to encode result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        Catalog, CatalogEntry, CatalogLink, ContentHash, INSTALLATION_MEDIA, MODULE_MANIFEST,
    };
    use crate::verify::Sha2Verifier;
    use provman_adapter::{ProviderContract, StructuralAdapter};
    use provman_core::{HashAlgorithm, ProviderCategory};
    use provman_test_utils::{RecordingHost, ScriptedTransport};
    use std::time::Duration;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn entry(name: &str, version: &str) -> CatalogEntry {
        let stem = name.to_lowercase();
        CatalogEntry {
            name: name.to_string(),
            version: version.parse().unwrap(),
            provider_type: ProviderCategory::PackageProvider,
            summary: Some(format!("{name} packages")),
            links: vec![
                link(&format!("{stem}-{version}.wasm"), INSTALLATION_MEDIA, &stem),
                link(&format!("{stem}-{version}.provider.toml"), MODULE_MANIFEST, &stem),
            ],
        }
    }

    fn link(file: &str, relationship: &str, stem: &str) -> CatalogLink {
        CatalogLink {
            href: format!("https://cdn.example/{file}"),
            relationship: relationship.to_string(),
            media_type: None,
            artifact: Some(stem.to_string()),
            target_filename: (relationship == INSTALLATION_MEDIA).then(|| format!("{stem}.wasm")),
            hash: Some(ContentHash {
                algorithm: HashAlgorithm::Sha256,
                value: ABC_SHA256.to_string(),
            }),
        }
    }

    fn provider(transport: Arc<ScriptedTransport>, dest: Option<PathBuf>) -> Arc<BootstrapProvider> {
        let catalog = Catalog {
            entries: vec![entry("Foo", "1.0"), entry("Foo", "2.0"), entry("Bar", "1.0")],
        };
        BootstrapProvider::new(
            Arc::new(CatalogSource::fixed(catalog)),
            Arc::new(Installer::new(transport, Arc::new(Sha2Verifier), Duration::from_secs(5))),
            dest,
        )
    }

    async fn proxy(p: &Arc<BootstrapProvider>) -> provman_adapter::AdapterProxy {
        StructuralAdapter::new()
            .create_adapter(ProviderContract::package_provider(), &[p.candidate_type().unwrap()])
            .unwrap()
    }

    #[tokio::test]
    async fn adapts_to_package_provider_contract() {
        let p = provider(ScriptedTransport::new(), None);
        let proxy = proxy(&p).await;
        let host = RecordingHost::new().handle();
        assert_eq!(
            proxy
                .call_string("get_package_provider_name", vec![], host)
                .await
                .unwrap()
                .as_deref(),
            Some(BOOTSTRAP_PROVIDER_NAME)
        );
        assert!(proxy.is_implemented("find_package"));
        assert!(!proxy.is_implemented("uninstall_package"));
    }

    #[tokio::test]
    async fn find_package_honors_version_bounds() {
        let p = provider(ScriptedTransport::new(), None);
        let proxy = proxy(&p).await;
        let host = RecordingHost::new().handle();

        let found: Vec<SoftwareIdentity> = proxy
            .call_json(
                "find_package",
                vec![json!("foo"), json!(""), json!("1.5"), json!("")],
                host,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "2.0.0.0");
        assert_eq!(found[0].fast_package_reference, "Foo#2.0.0.0");
    }

    #[tokio::test]
    async fn find_package_rejects_malformed_version() {
        let p = provider(ScriptedTransport::new(), None);
        let proxy = proxy(&p).await;
        let host = RecordingHost::new().handle();
        let result = proxy
            .invoke(
                "find_package",
                vec![json!("foo"), json!("one.two"), json!(""), json!("")],
                host,
            )
            .await;
        assert!(matches!(result, Err(ProvmanError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn install_uses_destination_option() {
        let transport = ScriptedTransport::new();
        transport.respond("https://cdn.example/foo-2.0.wasm", b"abc");
        transport.respond("https://cdn.example/foo-2.0.provider.toml", b"abc");
        let dir = tempfile::tempdir().unwrap();
        let p = provider(transport, None);
        let proxy = proxy(&p).await;
        let host = RecordingHost::new()
            .with_option(DESTINATION_OPTION, &dir.path().display().to_string())
            .handle();

        let installed: Vec<SoftwareIdentity> = proxy
            .call_json("install_package", vec![json!("Foo#2.0.0.0")], host.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(installed.len(), 1);
        assert!(dir.path().join("foo.wasm").exists());
        assert!(dir.path().join("foo.provider.toml").exists());
        assert_eq!(installed[0].filename.as_deref(), Some("foo.wasm"));

        let listed: Vec<SoftwareIdentity> = proxy
            .call_json("get_installed_packages", vec![json!("FOO")], host)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn install_without_destination_is_config_error() {
        let p = provider(ScriptedTransport::new(), None);
        let proxy = proxy(&p).await;
        let host = RecordingHost::new().handle();
        let result = proxy
            .invoke("install_package", vec![json!("Foo#2.0.0.0")], host)
            .await;
        assert!(matches!(result, Err(ProvmanError::Config(_))));
    }
}
