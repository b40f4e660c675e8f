// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bootstrap fallback through the real Bootstrap provider, with a scripted
//! transport standing in for the network.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use provman_bootstrap::{
    BootstrapProvider, Catalog, CatalogEntry, CatalogLink, CatalogSource, ContentHash, Installer,
    Sha2Verifier, INSTALLATION_MEDIA, MAX_ATTEMPTS, MODULE_MANIFEST,
};
use provman_config::{DiscoveryConfig, ProvmanConfig};
use provman_core::{
    DownloadTransport, FourPartVersion, HashAlgorithm, ModuleLoader, ProviderCategory,
};
use provman_plugin::{BuiltinModule, BuiltinModuleLoader, ProviderManager};
use provman_test_utils::{
    package_provider_type, InMemoryModuleLoader, RecordingHost, ScriptedTransport,
};

const MEDIA_URL: &str = "https://cdn.example/qux.wasm";
const MANIFEST_URL: &str = "https://cdn.example/qux-manifest.toml";

/// SHA-256 of "abc".
const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

const SIDECAR: &[u8] = b"[provider]\nname = \"qux\"\nversion = \"1.0\"\n";
/// SHA-256 of [`SIDECAR`].
const SIDECAR_SHA256: &str = "8a08a49b198987a0e07f50065cacee128c0f8476c4d89c1220db8700e72ef835";

fn link(href: &str, relationship: &str, hash: &str) -> CatalogLink {
    CatalogLink {
        href: href.into(),
        relationship: relationship.into(),
        media_type: None,
        artifact: Some("qux".into()),
        target_filename: None,
        hash: Some(ContentHash {
            algorithm: HashAlgorithm::Sha256,
            value: hash.into(),
        }),
    }
}

fn catalog(media_hash: &str) -> Catalog {
    Catalog {
        entries: vec![CatalogEntry {
            name: "Qux".into(),
            version: FourPartVersion::new(1, 0, 0, 0),
            provider_type: ProviderCategory::PackageProvider,
            summary: Some("Qux packages".into()),
            links: vec![
                link(MEDIA_URL, INSTALLATION_MEDIA, media_hash),
                link(MANIFEST_URL, MODULE_MANIFEST, SIDECAR_SHA256),
            ],
        }],
    }
}

fn manager(
    install_dir: &Path,
    transport: Arc<ScriptedTransport>,
    catalog: Catalog,
    modules: &Arc<InMemoryModuleLoader>,
) -> ProviderManager {
    let transport = transport as Arc<dyn DownloadTransport>;
    let installer = Installer::new(transport, Arc::new(Sha2Verifier), Duration::from_secs(5));
    let bootstrap = BootstrapProvider::new(
        Arc::new(CatalogSource::fixed(catalog)),
        Arc::new(installer),
        Some(install_dir.to_path_buf()),
    );
    let builtin = BuiltinModuleLoader::new().with_module(BuiltinModule::new(
        "core",
        FourPartVersion::new(0, 1, 0, 0),
        vec![bootstrap.candidate_type().unwrap()],
    ));

    let mut config = ProvmanConfig::default();
    config.discovery = DiscoveryConfig {
        bundled_modules: vec!["builtin:core".into()],
        machine_modules: vec![],
        user_modules: vec![],
        machine_extension_dir: None,
        user_extension_dir: Some(install_dir.to_path_buf()),
        scan_host_dir: false,
        module_extensions: vec!["wasm".into()],
    };
    config.bootstrap.feeds = vec![];

    ProviderManager::builder(config)
        .module_loader(Arc::new(builtin))
        .module_loader(modules.clone() as Arc<dyn ModuleLoader>)
        .host_dir(None)
        .build()
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn hash_mismatch_leaves_nothing_installed() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.respond(MEDIA_URL, b"tampered");
    transport.respond(MANIFEST_URL, SIDECAR);
    let modules = InMemoryModuleLoader::new();
    let mgr = manager(dir.path(), transport.clone(), catalog(ABC_SHA256), &modules);
    let recording = RecordingHost::new();
    let host = recording.handle();
    mgr.load_providers(&host).await;

    let installed = mgr
        .require_package_provider("test", "Qux", None, &host)
        .await
        .unwrap();
    assert!(!installed);
    assert_eq!(transport.attempts(MEDIA_URL), MAX_ATTEMPTS as usize);
    assert!(dir_is_empty(dir.path()));
    assert!(mgr.registry().package_providers.get("Qux").is_none());
    assert!(!recording.errors().is_empty());
}

#[tokio::test]
async fn verified_download_is_installed_and_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new();
    transport.respond(MEDIA_URL, b"abc");
    transport.respond(MANIFEST_URL, SIDECAR);
    let modules = InMemoryModuleLoader::new();
    let mgr = manager(dir.path(), transport.clone(), catalog(ABC_SHA256), &modules);
    let recording = RecordingHost::new();
    let host = recording.handle();
    mgr.load_providers(&host).await;

    // Stands in for executing the downloaded wasm.
    let module_path = dir.path().join("qux.wasm");
    modules.set_module(
        module_path.clone(),
        Some("1.0"),
        vec![package_provider_type("Qux", Some("1.0"))],
    );

    let selected = mgr.select_providers("Qux", &host).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(std::fs::read(&module_path).unwrap(), b"abc");
    assert_eq!(
        std::fs::read(dir.path().join("qux.provider.toml")).unwrap(),
        SIDECAR
    );
    assert_eq!(transport.attempts(MANIFEST_URL), 1);
    assert_eq!(transport.attempts(MEDIA_URL), 1);
    assert_eq!(recording.prompts()[0].location, MEDIA_URL);
    assert!(recording.warnings().is_empty());
}
