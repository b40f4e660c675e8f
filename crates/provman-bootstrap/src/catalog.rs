// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote catalog of installable providers.
//!
//! A feed is a JSON document:
//!
//! ```json
//! { "entries": [ {
//!     "name": "Foo", "version": "2.0", "provider_type": "PackageProvider",
//!     "summary": "Foo packages",
//!     "links": [ {
//!         "href": "https://cdn.example/foo.wasm",
//!         "relationship": "installationmedia",
//!         "artifact": "foo",
//!         "hash": { "algorithm": "sha256", "value": "ab12..." }
//!     }, {
//!         "href": "https://cdn.example/foo.provider.toml",
//!         "relationship": "modulemanifest",
//!         "artifact": "foo",
//!         "hash": { "algorithm": "sha256", "value": "cd34..." }
//!     } ]
//! } ] }
//! ```
//!
//! Feeds are fetched once per process through the download transport and
//! merged. Each feed gets up to [`MAX_ATTEMPTS`] tries; a feed that still
//! fails is skipped with a warning.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use provman_core::{
    DownloadTransport, FourPartVersion, HashAlgorithm, HostHandle, Link, ProviderCategory,
    ProvmanError, Result, SoftwareIdentity,
};

use crate::install::MAX_ATTEMPTS;

/// Relationship of the link carrying the provider module itself.
pub const INSTALLATION_MEDIA: &str = "installationmedia";

/// Relationship of the link carrying the module's sidecar manifest.
pub const MODULE_MANIFEST: &str = "modulemanifest";

/// Expected digest of a downloaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    pub algorithm: HashAlgorithm,
    /// Lowercase or uppercase hex.
    pub value: String,
}

/// A downloadable file belonging to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLink {
    pub href: String,
    pub relationship: String,
    #[serde(default)]
    pub media_type: Option<String>,
    /// Links with the same artifact are installed together.
    #[serde(default)]
    pub artifact: Option<String>,
    /// File name on disk. Defaults to the last URL path segment.
    #[serde(default)]
    pub target_filename: Option<String>,
    #[serde(default)]
    pub hash: Option<ContentHash>,
}

impl CatalogLink {
    pub fn is_installation_media(&self) -> bool {
        self.relationship.eq_ignore_ascii_case(INSTALLATION_MEDIA)
    }

    pub fn is_module_manifest(&self) -> bool {
        self.relationship.eq_ignore_ascii_case(MODULE_MANIFEST)
    }

    /// File name to install under.
    ///
    /// Must be a bare file name: anything with a directory component is
    /// rejected so a feed cannot write outside the install directory.
    pub fn file_name(&self) -> Result<String> {
        let name = match &self.target_filename {
            Some(name) => name.clone(),
            None => url::Url::parse(&self.href)
                .ok()
                .and_then(|url| {
                    url.path_segments()?
                        .next_back()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .ok_or_else(|| {
                    ProvmanError::InvalidArgument(format!(
                        "cannot derive a file name from `{}`",
                        self.href
                    ))
                })?,
        };
        ensure_bare_file_name(&name)?;
        Ok(name)
    }
}

fn ensure_bare_file_name(name: &str) -> Result<()> {
    let bare = Path::new(name).file_name().and_then(|n| n.to_str());
    if bare != Some(name) || name.contains(['/', '\\']) {
        return Err(ProvmanError::InvalidArgument(format!(
            "`{name}` is not a plain file name"
        )));
    }
    Ok(())
}

/// One installable provider version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub version: FourPartVersion,
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderCategory,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub links: Vec<CatalogLink>,
}

fn default_provider_type() -> ProviderCategory {
    ProviderCategory::PackageProvider
}

impl CatalogEntry {
    /// Reference that `install_package` accepts back.
    pub fn fast_package_reference(&self) -> String {
        format!("{}#{}", self.name, self.version)
    }

    pub fn to_identity(&self) -> SoftwareIdentity {
        let mut identity = SoftwareIdentity {
            fast_package_reference: self.fast_package_reference(),
            name: self.name.clone(),
            version: self.version.to_string(),
            version_scheme: Some("FourPartVersion".to_string()),
            summary: self.summary.clone(),
            source: Some("Bootstrap".to_string()),
            links: self
                .links
                .iter()
                .map(|l| Link {
                    href: l.href.clone(),
                    relationship: l.relationship.clone(),
                    media_type: l.media_type.clone(),
                    artifact: l.artifact.clone(),
                })
                .collect(),
            ..Default::default()
        };
        identity
            .metadata
            .insert("ProviderType".to_string(), self.provider_type.to_string());
        identity
    }
}

/// Version constraints for catalog queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionFilter {
    pub required: Option<FourPartVersion>,
    pub minimum: Option<FourPartVersion>,
    pub maximum: Option<FourPartVersion>,
}

impl VersionFilter {
    pub fn accepts(&self, v: FourPartVersion) -> bool {
        self.required.is_none_or(|r| v == r)
            && self.minimum.is_none_or(|m| v >= m)
            && self.maximum.is_none_or(|m| v <= m)
    }
}

/// In-memory merged catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProvmanError::Config(format!("invalid catalog feed: {e}")))
    }

    pub fn merge(&mut self, other: Catalog) {
        for entry in other.entries {
            let duplicate = self.entries.iter().any(|e| {
                e.name.eq_ignore_ascii_case(&entry.name) && e.version == entry.version
            });
            if !duplicate {
                self.entries.push(entry);
            }
        }
    }

    /// Entries matching `name` (all entries when empty) and the filter,
    /// ordered by name, then highest version first.
    pub fn find(&self, name: &str, filter: VersionFilter) -> Vec<&CatalogEntry> {
        let mut found: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| name.is_empty() || e.name.eq_ignore_ascii_case(name))
            .filter(|e| filter.accepts(e.version))
            .collect();
        found.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(b.version.cmp(&a.version))
        });
        found
    }

    /// Looks an entry up by its fast package reference.
    pub fn get(&self, fast_reference: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.fast_package_reference().eq_ignore_ascii_case(fast_reference))
    }
}

/// Lazily fetched catalog shared by every call of the bootstrap provider.
pub struct CatalogSource {
    feeds: Vec<String>,
    transport: Option<Arc<dyn DownloadTransport>>,
    timeout: Duration,
    catalog: OnceCell<Catalog>,
}

impl CatalogSource {
    pub fn new(feeds: Vec<String>, transport: Arc<dyn DownloadTransport>, timeout: Duration) -> Self {
        Self {
            feeds,
            transport: Some(transport),
            timeout,
            catalog: OnceCell::new(),
        }
    }

    /// A source that never touches the network.
    pub fn fixed(catalog: Catalog) -> Self {
        Self {
            feeds: Vec::new(),
            transport: None,
            timeout: Duration::from_secs(0),
            catalog: OnceCell::from(catalog),
        }
    }

    /// Returns the catalog, fetching the feeds on first use.
    ///
    /// If every feed fails the error is returned and the next call retries.
    pub async fn catalog(&self, host: &HostHandle) -> Result<&Catalog> {
        self.catalog.get_or_try_init(|| self.fetch(host)).await
    }

    async fn fetch(&self, host: &HostHandle) -> Result<Catalog> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            ProvmanError::Internal("catalog source has no transport".to_string())
        })?;
        let scratch = tempfile::tempdir()?;

        let mut merged = Catalog::default();
        let mut loaded_any = false;
        for (i, feed) in self.feeds.iter().enumerate() {
            let target = scratch.path().join(format!("feed-{i}.json"));
            match fetch_feed(transport.as_ref(), feed, &target, self.timeout, host).await {
                Ok(catalog) => {
                    debug!(feed = %feed, entries = catalog.entries.len(), "catalog feed loaded");
                    merged.merge(catalog);
                    loaded_any = true;
                }
                Err(e) => {
                    warn!(feed = %feed, error = %e, "catalog feed unavailable");
                    host.warning(&format!("Unable to load provider catalog '{feed}': {e}"));
                }
            }
        }

        if loaded_any {
            Ok(merged)
        } else {
            Err(ProvmanError::BootstrapUnavailable(
                "no provider catalog feed could be loaded".to_string(),
            ))
        }
    }
}

async fn fetch_feed(
    transport: &dyn DownloadTransport,
    feed: &str,
    target: &Path,
    timeout: Duration,
    host: &HostHandle,
) -> Result<Catalog> {
    let mut last_error = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match transport.download(feed, target, timeout, false, host).await {
            Ok(Some(path)) => {
                let text = tokio::fs::read_to_string(&path).await?;
                return Catalog::parse(&text);
            }
            Ok(None) => {
                return Err(ProvmanError::Download {
                    uri: feed.to_string(),
                    message: "feed not found".to_string(),
                });
            }
            Err(e) => {
                warn!(feed = %feed, attempt, error = %e, "catalog feed attempt failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ProvmanError::Download {
        uri: feed.to_string(),
        message: "no attempt was made".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, version: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            version: version.parse().unwrap(),
            provider_type: ProviderCategory::PackageProvider,
            summary: None,
            links: vec![CatalogLink {
                href: format!("https://cdn.example/{}.wasm", name.to_lowercase()),
                relationship: INSTALLATION_MEDIA.to_string(),
                media_type: None,
                artifact: None,
                target_filename: None,
                hash: None,
            }],
        }
    }

    fn sample() -> Catalog {
        Catalog {
            entries: vec![entry("Foo", "1.0"), entry("Foo", "2.0"), entry("Bar", "1.5")],
        }
    }

    #[test]
    fn parse_feed_json() {
        let json = r#"{"entries":[{"name":"Foo","version":"2.0","links":[
            {"href":"https://cdn.example/foo.wasm","relationship":"installationmedia",
             "hash":{"algorithm":"sha256","value":"00"}}]}]}"#;
        let catalog = Catalog::parse(json).unwrap();
        assert_eq!(catalog.entries.len(), 1);
        let e = &catalog.entries[0];
        assert_eq!(e.provider_type, ProviderCategory::PackageProvider);
        assert_eq!(
            e.links[0].hash.as_ref().unwrap().algorithm,
            HashAlgorithm::Sha256
        );
    }

    #[test]
    fn invalid_feed_is_config_error() {
        assert!(matches!(
            Catalog::parse("{not json"),
            Err(ProvmanError::Config(_))
        ));
    }

    #[test]
    fn find_orders_highest_version_first() {
        let catalog = sample();
        let found = catalog.find("foo", VersionFilter::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].version.to_string(), "2.0.0.0");
    }

    #[test]
    fn find_applies_version_filters() {
        let catalog = sample();
        let filter = VersionFilter {
            maximum: Some("1.9".parse().unwrap()),
            ..Default::default()
        };
        let found = catalog.find("Foo", filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version.to_string(), "1.0.0.0");

        let filter = VersionFilter {
            required: Some("2.0".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(catalog.find("Foo", filter).len(), 1);

        let filter = VersionFilter {
            minimum: Some("3.0".parse().unwrap()),
            ..Default::default()
        };
        assert!(catalog.find("Foo", filter).is_empty());
    }

    #[test]
    fn empty_name_lists_everything() {
        let catalog = sample();
        let names: Vec<&str> = catalog
            .find("", VersionFilter::default())
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Bar", "Foo", "Foo"]);
    }

    #[test]
    fn merge_skips_duplicates() {
        let mut catalog = sample();
        catalog.merge(Catalog {
            entries: vec![entry("foo", "2.0"), entry("Baz", "0.1")],
        });
        assert_eq!(catalog.entries.len(), 4);
    }

    #[test]
    fn fast_reference_round_trips() {
        let catalog = sample();
        let reference = catalog.entries[1].fast_package_reference();
        assert_eq!(reference, "Foo#2.0.0.0");
        assert_eq!(catalog.get(&reference), Some(&catalog.entries[1]));
    }

    #[test]
    fn link_file_name_defaults_to_url_segment() {
        let e = entry("Foo", "1.0");
        assert_eq!(e.links[0].file_name().unwrap(), "foo.wasm");
    }

    #[test]
    fn link_file_name_must_not_leave_the_directory() {
        let mut link = entry("Foo", "1.0").links.remove(0);
        for bad in ["../escaped.wasm", "/etc/escaped.wasm", "sub/foo.wasm", "..\\foo.wasm", ".."] {
            link.target_filename = Some(bad.to_string());
            assert!(
                matches!(link.file_name(), Err(ProvmanError::InvalidArgument(_))),
                "{bad} was accepted"
            );
        }
        link.target_filename = Some("foo-renamed.wasm".to_string());
        assert_eq!(link.file_name().unwrap(), "foo-renamed.wasm");
    }

    const FEED_URL: &str = "https://feeds.example/providers.json";
    const FEED_JSON: &[u8] = br#"{"entries":[{"name":"Foo","version":"2.0","links":[]}]}"#;

    #[tokio::test]
    async fn feed_fetch_retries_transient_failures() {
        let transport = provman_test_utils::ScriptedTransport::new();
        transport.fail_once(FEED_URL);
        transport.respond(FEED_URL, FEED_JSON);
        let host = provman_test_utils::RecordingHost::new();
        let source = CatalogSource::new(
            vec![FEED_URL.to_string()],
            transport.clone(),
            Duration::from_secs(5),
        );

        let catalog = source.catalog(&host.handle()).await.unwrap();
        assert_eq!(catalog.entries.len(), 1);
        assert_eq!(transport.attempts(FEED_URL), 2);
        assert!(host.warnings().is_empty());
    }

    #[tokio::test]
    async fn feed_fetch_gives_up_after_max_attempts() {
        let transport = provman_test_utils::ScriptedTransport::new();
        transport.fail_once(FEED_URL);
        let host = provman_test_utils::RecordingHost::new();
        let source = CatalogSource::new(
            vec![FEED_URL.to_string()],
            transport.clone(),
            Duration::from_secs(5),
        );

        let result = source.catalog(&host.handle()).await;
        assert!(matches!(result, Err(ProvmanError::BootstrapUnavailable(_))));
        assert_eq!(transport.attempts(FEED_URL), MAX_ATTEMPTS as usize);
        assert_eq!(host.warnings().len(), 1);
    }

    #[test]
    fn identity_carries_links_and_type() {
        let id = entry("Foo", "1.0").to_identity();
        assert_eq!(id.links.len(), 1);
        assert_eq!(id.metadata.get("ProviderType").map(String::as_str), Some("PackageProvider"));
    }
}
