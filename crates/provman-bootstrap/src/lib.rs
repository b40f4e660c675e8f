// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bootstrap support: acquiring providers that are not installed yet.
//!
//! The types here make up the builtin core module: the "Bootstrap" package
//! provider, which installs other providers from a remote catalog, and the
//! "WebDownloader" downloader. Both go through the same adapter and
//! registry path as any other provider.

pub mod catalog;
pub mod downloader;
pub mod install;
pub mod provider;
pub mod transport;
pub mod verify;

use std::sync::Arc;
use std::time::Duration;

use provman_config::ProvmanConfig;
use provman_core::{CandidateType, DownloadTransport, Result, TrustVerifier};

pub use catalog::{
    Catalog, CatalogEntry, CatalogLink, CatalogSource, ContentHash, VersionFilter,
    INSTALLATION_MEDIA, MODULE_MANIFEST,
};
pub use downloader::{web_downloader_type, WEB_DOWNLOADER_NAME};
pub use install::{Installer, FILE_FAILED_VERIFICATION, MAX_ATTEMPTS};
pub use provider::{BootstrapProvider, BOOTSTRAP_PROVIDER_NAME, DESTINATION_OPTION};
pub use transport::HttpsTransport;
pub use verify::Sha2Verifier;

/// Builds the public types of the builtin core module.
///
/// With a `trust` oracle, installation media must also pass its signature
/// check. Without one, a file lacking a catalog hash needs host approval.
pub fn core_module_types(
    config: &ProvmanConfig,
    transport: Arc<dyn DownloadTransport>,
    trust: Option<Arc<dyn TrustVerifier>>,
) -> Result<Vec<Arc<dyn CandidateType>>> {
    let timeout = Duration::from_secs(config.bootstrap.timeout_secs);
    let catalog = Arc::new(CatalogSource::new(
        config.bootstrap.feeds.clone(),
        transport.clone(),
        timeout,
    ));
    let mut installer = Installer::new(transport.clone(), Arc::new(Sha2Verifier), timeout);
    if let Some(trust) = trust {
        installer = installer.with_trust_verifier(trust);
    }
    let installer = Arc::new(installer);
    let bootstrap = BootstrapProvider::new(catalog, installer, config.install_destination());

    Ok(vec![
        bootstrap.candidate_type()?,
        web_downloader_type(transport, timeout)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use provman_test_utils::ScriptedTransport;

    #[test]
    fn core_module_exposes_bootstrap_and_downloader() {
        let types =
            core_module_types(&ProvmanConfig::default(), ScriptedTransport::new(), None).unwrap();
        let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["BootstrapProvider", "WebDownloader"]);
        assert!(types.iter().all(|t| t.has_default_constructor()));
    }

    struct RejectAll;

    #[async_trait::async_trait]
    impl TrustVerifier for RejectAll {
        async fn is_signed_and_trusted(
            &self,
            _path: &std::path::Path,
            _host: &provman_core::HostHandle,
        ) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn trust_oracle_gates_core_module_installs() {
        const FEED: &str = "https://feeds.example/providers.json";
        const ABC_SHA256: &str =
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let feed = serde_json::json!({ "entries": [{
            "name": "Foo", "version": "1.0",
            "links": [
                { "href": "https://cdn.example/foo.wasm", "relationship": INSTALLATION_MEDIA,
                  "hash": { "algorithm": "sha256", "value": ABC_SHA256 } },
                { "href": "https://cdn.example/foo.provider.toml", "relationship": MODULE_MANIFEST,
                  "artifact": "https://cdn.example/foo.wasm",
                  "hash": { "algorithm": "sha256", "value": ABC_SHA256 } }
            ]
        }]});
        let transport = ScriptedTransport::new();
        transport.respond(FEED, feed.to_string().as_bytes());
        transport.respond("https://cdn.example/foo.wasm", b"abc");
        transport.respond("https://cdn.example/foo.provider.toml", b"abc");
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProvmanConfig::default();
        config.bootstrap.feeds = vec![FEED.to_string()];
        config.bootstrap.destination = Some(dir.path().to_path_buf());

        let types = core_module_types(&config, transport, Some(Arc::new(RejectAll))).unwrap();
        let proxy = provman_adapter::StructuralAdapter::new()
            .create_adapter(provman_adapter::ProviderContract::package_provider(), &types[..1])
            .unwrap();
        let host = provman_test_utils::RecordingHost::new().handle();

        let result = proxy
            .invoke("install_package", vec![serde_json::json!("Foo#1.0.0.0")], host)
            .await;
        assert!(matches!(
            result,
            Err(provman_core::ProvmanError::Verification { .. })
        ));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
