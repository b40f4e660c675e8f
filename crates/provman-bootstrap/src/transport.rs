// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTPS download transport.
//!
//! Remote files are only fetched over TLS 1.2 or newer. Plain http is
//! refused unless the transport was built for loopback testing, and even
//! then only for loopback hosts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use provman_core::{DownloadTransport, HostHandle, ProvmanError, Result};

const USER_AGENT: &str = concat!("provman/", env!("CARGO_PKG_VERSION"));

/// Downloads files with reqwest.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    client: reqwest::Client,
    allow_loopback_http: bool,
}

impl HttpsTransport {
    pub fn new() -> Result<Self> {
        Self::build(false)
    }

    /// A transport that also accepts `http://` to loopback addresses.
    pub fn allowing_loopback_http() -> Result<Self> {
        Self::build(true)
    }

    fn build(allow_loopback_http: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .https_only(!allow_loopback_http)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                error!("failed to build download client: {e}");
                ProvmanError::Internal(format!("failed to build download client: {e}"))
            })?;
        Ok(Self {
            client,
            allow_loopback_http,
        })
    }

    async fn fetch(
        &self,
        uri: &str,
        destination: &Path,
        show_progress: bool,
        host: &HostHandle,
    ) -> Result<Option<PathBuf>> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| download_error(uri, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(uri, "remote file not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProvmanError::Download {
                uri: uri.to_string(),
                message: format!("server answered {status}"),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = response.content_length();
        let activity = show_progress.then(|| host.start_progress(0, &format!("Downloading {uri}")));
        let mut file = tokio::fs::File::create(destination).await?;
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            if host.is_cancelled() {
                finish_progress(host, activity, false);
                drop(file);
                let _ = tokio::fs::remove_file(destination).await;
                return Err(ProvmanError::Download {
                    uri: uri.to_string(),
                    message: "cancelled".to_string(),
                });
            }
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    finish_progress(host, activity, false);
                    return Err(download_error(uri, e));
                }
            };
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if let (Some(id), Some(total)) = (activity, total.filter(|t| *t > 0)) {
                let percent = (received.saturating_mul(100) / total).min(100) as u8;
                host.progress(id, percent, uri);
            }
        }
        file.flush().await?;
        finish_progress(host, activity, true);

        debug!(uri, bytes = received, path = %destination.display(), "download complete");
        Ok(Some(destination.to_path_buf()))
    }
}

#[async_trait]
impl DownloadTransport for HttpsTransport {
    async fn download(
        &self,
        uri: &str,
        destination: &Path,
        timeout: Duration,
        show_progress: bool,
        host: &HostHandle,
    ) -> Result<Option<PathBuf>> {
        validate_url(uri, self.allow_loopback_http)?;

        let fetch = self.fetch(uri, destination, show_progress, host);
        match tokio::time::timeout(timeout, fetch).await {
            Ok(result) => result,
            Err(_) => {
                let _ = tokio::fs::remove_file(destination).await;
                Err(ProvmanError::Timeout { duration: timeout })
            }
        }
    }
}

fn finish_progress(host: &HostHandle, activity: Option<u32>, succeeded: bool) {
    if let Some(id) = activity {
        host.complete_progress(id, succeeded);
    }
}

fn download_error(uri: &str, e: reqwest::Error) -> ProvmanError {
    ProvmanError::Download {
        uri: uri.to_string(),
        message: e.to_string(),
    }
}

/// Rejects anything but https (and loopback http when allowed).
pub fn validate_url(uri: &str, allow_loopback_http: bool) -> Result<()> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| ProvmanError::InvalidArgument(format!("invalid URL `{uri}`: {e}")))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if allow_loopback_http && is_loopback(parsed.host_str().unwrap_or("")) => Ok(()),
        scheme => Err(ProvmanError::Download {
            uri: uri.to_string(),
            message: format!("scheme `{scheme}` is not allowed, use https"),
        }),
    }
}

/// Whether a host string names the local machine.
pub fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "::1" | "[::1]") || host.starts_with("127.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds() {
        assert!(HttpsTransport::new().is_ok());
        assert!(HttpsTransport::allowing_loopback_http().is_ok());
    }

    #[test]
    fn https_is_accepted() {
        assert!(validate_url("https://cdn.example/foo.wasm", false).is_ok());
    }

    #[test]
    fn plain_http_is_rejected() {
        let err = validate_url("http://cdn.example/foo.wasm", false).unwrap_err();
        assert!(err.to_string().contains("use https"));
        assert!(validate_url("http://cdn.example/foo.wasm", true).is_err());
    }

    #[test]
    fn loopback_http_only_when_allowed() {
        assert!(validate_url("http://127.0.0.1:8080/a", false).is_err());
        assert!(validate_url("http://127.0.0.1:8080/a", true).is_ok());
        assert!(validate_url("http://localhost/a", true).is_ok());
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(validate_url("file:///etc/passwd", true).is_err());
        assert!(validate_url("ftp://cdn.example/a", true).is_err());
        assert!(matches!(
            validate_url("not a url", false),
            Err(ProvmanError::InvalidArgument(_))
        ));
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("127.0.0.2"));
        assert!(is_loopback("[::1]"));
        assert!(!is_loopback("10.0.0.1"));
        assert!(!is_loopback("cdn.example"));
    }
}
