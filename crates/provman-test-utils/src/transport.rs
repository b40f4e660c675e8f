// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted download transport.
//!
//! Responses are queued per URI. The last response in a queue repeats, so
//! a single `respond` covers every retry.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use provman_core::{DownloadTransport, HostHandle, ProvmanError, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Bytes(Vec<u8>),
    NotFound,
    Fail,
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, uri: &str, body: &[u8]) {
        self.push(uri, Scripted::Bytes(body.to_vec()));
    }

    pub fn not_found(&self, uri: &str) {
        self.push(uri, Scripted::NotFound);
    }

    /// Queues one transport failure.
    pub fn fail_once(&self, uri: &str) {
        self.push(uri, Scripted::Fail);
    }

    /// How many times `uri` was requested.
    pub fn attempts(&self, uri: &str) -> usize {
        self.attempts.lock().unwrap().get(uri).copied().unwrap_or(0)
    }

    fn push(&self, uri: &str, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(uri.to_string())
            .or_default()
            .push_back(response);
    }

    fn next(&self, uri: &str) -> Option<Scripted> {
        *self.attempts.lock().unwrap().entry(uri.to_string()).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(uri)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl DownloadTransport for ScriptedTransport {
    async fn download(
        &self,
        uri: &str,
        destination: &Path,
        _timeout: Duration,
        _show_progress: bool,
        _host: &HostHandle,
    ) -> Result<Option<PathBuf>> {
        match self.next(uri) {
            Some(Scripted::Bytes(body)) => {
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(destination, body).await?;
                Ok(Some(destination.to_path_buf()))
            }
            Some(Scripted::NotFound) => Ok(None),
            Some(Scripted::Fail) => Err(ProvmanError::Download {
                uri: uri.to_string(),
                message: "scripted failure".to_string(),
            }),
            None => Err(ProvmanError::Download {
                uri: uri.to_string(),
                message: "no scripted response".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingHost;

    #[tokio::test]
    async fn last_response_repeats() {
        let transport = ScriptedTransport::new();
        transport.fail_once("https://a/x");
        transport.respond("https://a/x", b"ok");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x");
        let host = RecordingHost::new().handle();

        let t: Arc<dyn DownloadTransport> = transport.clone();
        assert!(t.download("https://a/x", &dest, Duration::ZERO, false, &host).await.is_err());
        for _ in 0..2 {
            let got = t.download("https://a/x", &dest, Duration::ZERO, false, &host).await;
            assert_eq!(got.unwrap(), Some(dest.clone()));
        }
        assert_eq!(transport.attempts("https://a/x"), 3);
    }
}
