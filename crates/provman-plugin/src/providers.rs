// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed facades over adapted providers.
//!
//! Each facade wraps an [`AdapterProxy`] bound to one contract and exposes
//! the contract's operations with Rust types. Stubbed members answer with
//! empty results, so callers never need to check `is_implemented` first.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use provman_adapter::AdapterProxy;
use provman_core::{CandidateObject, FourPartVersion, HostHandle, Result, SoftwareIdentity};

/// Feature map reported by `get_features`: feature name to values.
pub type Features = BTreeMap<String, Vec<String>>;

/// A registered provider of any category.
#[derive(Debug)]
pub struct ProviderHandle {
    pub name: String,
    pub version: FourPartVersion,
    /// Path of the module that supplied the provider.
    pub module_path: PathBuf,
    /// Whether that module came from the bundled module list.
    pub bundled: bool,
    pub proxy: Arc<AdapterProxy>,
}

impl ProviderHandle {
    /// Whether the provider really implements `member` (not a stub).
    pub fn is_implemented(&self, member: &str) -> bool {
        self.proxy.is_implemented(member)
    }

    pub async fn features(&self, host: &HostHandle) -> Result<Features> {
        Ok(self
            .proxy
            .call_json::<Features>("get_features", vec![], host.clone())
            .await?
            .unwrap_or_default())
    }
}

macro_rules! facade {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(Arc<ProviderHandle>);

        impl $name {
            pub fn new(handle: ProviderHandle) -> Self {
                Self(Arc::new(handle))
            }

            pub fn handle(&self) -> &Arc<ProviderHandle> {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = ProviderHandle;

            fn deref(&self) -> &ProviderHandle {
                &self.0
            }
        }
    };
}

facade!(
    /// A provider that finds and installs packages.
    PackageProvider
);
facade!(
    /// A provider that unpacks archive files.
    Archiver
);
facade!(
    /// A provider that fetches files by URI.
    Downloader
);
facade!(
    /// A provider that constructs other providers by name.
    MetaProvider
);

impl PackageProvider {
    /// Searches for packages. Empty strings mean "no constraint".
    pub async fn find_package(
        &self,
        name: &str,
        required_version: &str,
        minimum_version: &str,
        maximum_version: &str,
        host: &HostHandle,
    ) -> Result<Vec<SoftwareIdentity>> {
        let args = vec![
            json!(name),
            json!(required_version),
            json!(minimum_version),
            json!(maximum_version),
        ];
        Ok(self
            .proxy
            .call_json("find_package", args, host.clone())
            .await?
            .unwrap_or_default())
    }

    pub async fn install_package(
        &self,
        fast_package_reference: &str,
        host: &HostHandle,
    ) -> Result<Vec<SoftwareIdentity>> {
        Ok(self
            .proxy
            .call_json("install_package", vec![json!(fast_package_reference)], host.clone())
            .await?
            .unwrap_or_default())
    }

    pub async fn uninstall_package(
        &self,
        fast_package_reference: &str,
        host: &HostHandle,
    ) -> Result<Vec<SoftwareIdentity>> {
        Ok(self
            .proxy
            .call_json("uninstall_package", vec![json!(fast_package_reference)], host.clone())
            .await?
            .unwrap_or_default())
    }

    pub async fn get_installed_packages(
        &self,
        name: &str,
        host: &HostHandle,
    ) -> Result<Vec<SoftwareIdentity>> {
        Ok(self
            .proxy
            .call_json("get_installed_packages", vec![json!(name)], host.clone())
            .await?
            .unwrap_or_default())
    }
}

impl Archiver {
    /// Unpacks `archive` into `destination`, returning the extracted paths.
    pub async fn unpack_archive(
        &self,
        archive: &str,
        destination: &str,
        host: &HostHandle,
    ) -> Result<Vec<String>> {
        self.proxy
            .call_string_list(
                "unpack_archive",
                vec![json!(archive), json!(destination)],
                host.clone(),
            )
            .await
    }

    pub async fn is_supported_file(&self, path: &str, host: &HostHandle) -> Result<bool> {
        self.proxy
            .call_bool("is_supported_file", vec![json!(path)], host.clone())
            .await
    }
}

impl Downloader {
    pub async fn supported_schemes(&self, host: &HostHandle) -> Result<Vec<String>> {
        self.proxy
            .call_string_list("supported_schemes", vec![], host.clone())
            .await
    }

    /// Downloads `uri` to `destination`. `None` means the remote had no
    /// such file.
    pub async fn download_file(
        &self,
        uri: &str,
        destination: &str,
        host: &HostHandle,
    ) -> Result<Option<String>> {
        self.proxy
            .call_string(
                "download_file",
                vec![json!(uri), json!(destination)],
                host.clone(),
            )
            .await
    }
}

impl MetaProvider {
    /// Names of the providers this meta-provider can construct.
    pub async fn provider_names(&self, host: &HostHandle) -> Result<Vec<String>> {
        self.proxy
            .call_string_list("get_provider_names", vec![], host.clone())
            .await
    }

    /// Asks for a live provider instance by name.
    pub async fn create_provider(
        &self,
        name: &str,
        host: &HostHandle,
    ) -> Result<Option<Arc<dyn CandidateObject>>> {
        self.proxy
            .call_object("create_provider", vec![json!(name)], host.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provman_adapter::{ProviderContract, StructuralAdapter};
    use provman_test_utils::{archiver_type, package_provider_type_with_features, RecordingHost};

    fn handle(proxy: AdapterProxy) -> ProviderHandle {
        ProviderHandle {
            name: "Foo".into(),
            version: FourPartVersion::new(1, 0, 0, 0),
            module_path: PathBuf::from("builtin:test"),
            bundled: false,
            proxy: Arc::new(proxy),
        }
    }

    #[tokio::test]
    async fn package_provider_reports_features_and_stubs() {
        let ty = package_provider_type_with_features(
            "Foo",
            Some("1.0"),
            json!({"supports-powershell-modules": [], "file-extensions": [".foo"]}),
        );
        let proxy = StructuralAdapter::new()
            .create_adapter(ProviderContract::package_provider(), &[ty])
            .unwrap();
        let provider = PackageProvider::new(handle(proxy));
        let host = RecordingHost::new().handle();

        let features = provider.features(&host).await.unwrap();
        assert_eq!(features["file-extensions"], vec![".foo"]);
        assert!(features.contains_key("supports-powershell-modules"));

        assert!(!provider.is_implemented("install_package"));
        assert!(provider.install_package("Foo#1", &host).await.unwrap().is_empty());
        assert!(provider
            .find_package("x", "", "", "", &host)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn archiver_forwards_calls() {
        let proxy = StructuralAdapter::new()
            .create_adapter(ProviderContract::archiver(), &[archiver_type("Zip")])
            .unwrap();
        let archiver = Archiver::new(handle(proxy));
        let host = RecordingHost::new().handle();

        assert!(archiver.is_implemented("unpack_archive"));
        assert!(!archiver.is_implemented("is_supported_file"));
        assert!(!archiver.is_supported_file("a.zip", &host).await.unwrap());
        let files = archiver.unpack_archive("a.zip", "/tmp/out", &host).await.unwrap();
        assert!(files.is_empty());
    }
}
