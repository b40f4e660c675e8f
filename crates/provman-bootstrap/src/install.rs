// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Verified download and install of catalog artifacts.
//!
//! Every file is downloaded next to its target as `<name>.download`, checked
//! against its catalog hash, and only then renamed into place. A file that
//! fails verification is deleted before the next attempt. A file without a
//! hash is only kept when the trust oracle vouches for it or the host
//! approves the untrusted source.
//!
//! An artifact group must carry a module manifest link next to its
//! installation media. The manifest is always installed as
//! `<media stem>.provider.toml` so discovery can pair it with the module.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use provman_core::{
    DownloadTransport, HashVerifier, HostHandle, ProvmanError, Result, TrustVerifier,
    SIDECAR_SUFFIX,
};

use crate::catalog::{CatalogEntry, CatalogLink};
use crate::verify::verify_file;

/// Download attempts per file before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Host error code reported when a file never passes verification.
pub const FILE_FAILED_VERIFICATION: &str = "FileFailedVerification";

pub struct Installer {
    transport: Arc<dyn DownloadTransport>,
    verifier: Arc<dyn HashVerifier>,
    trust: Option<Arc<dyn TrustVerifier>>,
    timeout: Duration,
}

impl Installer {
    pub fn new(
        transport: Arc<dyn DownloadTransport>,
        verifier: Arc<dyn HashVerifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            verifier,
            trust: None,
            timeout,
        }
    }

    /// Requires installation media to pass a signature check as well.
    pub fn with_trust_verifier(mut self, trust: Arc<dyn TrustVerifier>) -> Self {
        self.trust = Some(trust);
        self
    }

    /// Downloads one link into `dest_dir` and validates it.
    ///
    /// `Ok(None)` means the remote does not have the file. Transport errors
    /// and hash mismatches are retried up to [`MAX_ATTEMPTS`]; a failed
    /// trust check or a declined untrusted source is final.
    pub async fn download_and_validate(
        &self,
        link: &CatalogLink,
        dest_dir: &Path,
        host: &HostHandle,
    ) -> Result<Option<PathBuf>> {
        let file_name = link.file_name()?;
        self.fetch_verified(link, dest_dir, &file_name, host).await
    }

    async fn fetch_verified(
        &self,
        link: &CatalogLink,
        dest_dir: &Path,
        file_name: &str,
        host: &HostHandle,
    ) -> Result<Option<PathBuf>> {
        let target = dest_dir.join(file_name);
        let partial = dest_dir.join(format!("{file_name}.download"));

        tokio::fs::create_dir_all(dest_dir).await?;

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            debug!(uri = %link.href, attempt, "downloading");
            let downloaded = match self
                .transport
                .download(&link.href, &partial, self.timeout, true, host)
                .await
            {
                Ok(Some(path)) => path,
                Ok(None) => {
                    remove_quietly(&partial).await;
                    return Ok(None);
                }
                Err(e) => {
                    warn!(uri = %link.href, attempt, error = %e, "download attempt failed");
                    remove_quietly(&partial).await;
                    last_error = Some(e);
                    continue;
                }
            };

            if let Some(expected) = &link.hash {
                match verify_file(self.verifier.as_ref(), &downloaded, expected).await {
                    Ok(true) => {}
                    Ok(false) => {
                        remove_quietly(&downloaded).await;
                        warn!(uri = %link.href, attempt, algorithm = %expected.algorithm, "hash mismatch");
                        host.warning(&format!(
                            "{FILE_FAILED_VERIFICATION}: {} did not match its {} hash",
                            link.href, expected.algorithm
                        ));
                        last_error = Some(ProvmanError::Verification {
                            path: target.clone(),
                            message: format!("{} mismatch", expected.algorithm),
                        });
                        continue;
                    }
                    Err(e) => {
                        remove_quietly(&downloaded).await;
                        return Err(e);
                    }
                }
            }

            let mut signed = false;
            if link.is_installation_media() {
                if let Some(trust) = &self.trust {
                    if !trust.is_signed_and_trusted(&downloaded, host).await {
                        remove_quietly(&downloaded).await;
                        host.error(
                            FILE_FAILED_VERIFICATION,
                            &format!("{} is not signed by a trusted publisher", link.href),
                        );
                        return Err(ProvmanError::Verification {
                            path: target,
                            message: "signature is missing or untrusted".to_string(),
                        });
                    }
                    signed = true;
                }
            }

            if link.hash.is_none() && !signed {
                if !host
                    .should_continue_with_untrusted_source(file_name, &link.href)
                    .await
                {
                    remove_quietly(&downloaded).await;
                    host.error(
                        FILE_FAILED_VERIFICATION,
                        &format!("{} has no content hash and was not approved", link.href),
                    );
                    return Err(ProvmanError::Verification {
                        path: target,
                        message: "no content hash and the source was not approved".to_string(),
                    });
                }
                warn!(uri = %link.href, "keeping unverified file on host approval");
            }

            tokio::fs::rename(&downloaded, &target).await?;
            info!(uri = %link.href, path = %target.display(), "installed file");
            return Ok(Some(target));
        }

        let error = last_error.unwrap_or_else(|| ProvmanError::Download {
            uri: link.href.clone(),
            message: "no attempt was made".to_string(),
        });
        host.error(
            FILE_FAILED_VERIFICATION,
            &format!("giving up on {} after {MAX_ATTEMPTS} attempts: {error}", link.href),
        );
        Err(error)
    }

    /// Installs every file of the first artifact group that succeeds.
    ///
    /// Links sharing an `artifact` (or, without one, the same href) form a
    /// group. Only groups carrying installation media are considered, and a
    /// group without a module manifest is skipped. A group that fails
    /// part-way is removed from disk before the next is tried.
    pub async fn install_entry(
        &self,
        entry: &CatalogEntry,
        dest_dir: &Path,
        host: &HostHandle,
    ) -> Result<Vec<PathBuf>> {
        let groups = artifact_groups(&entry.links);
        if groups.is_empty() {
            return Err(ProvmanError::BootstrapUnavailable(format!(
                "{} has no installation media",
                entry.fast_package_reference()
            )));
        }

        let mut last_error = None;
        'groups: for group in groups {
            let sidecar_name = match sidecar_name(&group) {
                Ok(name) => name,
                Err(e) => {
                    warn!(entry = %entry.fast_package_reference(), error = %e, "skipping artifact group");
                    last_error = Some(e);
                    continue;
                }
            };
            let mut installed = Vec::new();
            for link in group {
                let file_name = if link.is_module_manifest() {
                    Ok(sidecar_name.clone())
                } else {
                    link.file_name()
                };
                let fetched = match file_name {
                    Ok(name) => self.fetch_verified(link, dest_dir, &name, host).await,
                    Err(e) => Err(e),
                };
                match fetched {
                    Ok(Some(path)) => installed.push(path),
                    Ok(None) => {
                        last_error = Some(ProvmanError::Download {
                            uri: link.href.clone(),
                            message: "not found".to_string(),
                        });
                        remove_all(&installed).await;
                        continue 'groups;
                    }
                    Err(e) => {
                        last_error = Some(e);
                        remove_all(&installed).await;
                        continue 'groups;
                    }
                }
            }
            return Ok(installed);
        }

        Err(last_error.unwrap_or_else(|| {
            ProvmanError::BootstrapUnavailable(entry.fast_package_reference())
        }))
    }
}

/// Sidecar file name for a group: the media file's stem plus the manifest
/// suffix.
fn sidecar_name(group: &[&CatalogLink]) -> Result<String> {
    if !group.iter().any(|l| l.is_module_manifest()) {
        return Err(ProvmanError::BootstrapUnavailable(
            "artifact group ships no module manifest".to_string(),
        ));
    }
    let media = group
        .iter()
        .find(|l| l.is_installation_media())
        .ok_or_else(|| ProvmanError::Internal("artifact group without media".to_string()))?;
    let media_name = media.file_name()?;
    let stem = Path::new(&media_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(media_name);
    Ok(format!("{stem}{SIDECAR_SUFFIX}"))
}

fn artifact_groups(links: &[CatalogLink]) -> Vec<Vec<&CatalogLink>> {
    let mut groups: Vec<(String, Vec<&CatalogLink>)> = Vec::new();
    for link in links {
        let key = link.artifact.clone().unwrap_or_else(|| link.href.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(link),
            None => groups.push((key, vec![link])),
        }
    }
    groups
        .into_iter()
        .map(|(_, members)| members)
        .filter(|members| members.iter().any(|l| l.is_installation_media()))
        .collect()
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        remove_quietly(path).await;
    }
}
