// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording host for deterministic tests.
//!
//! `RecordingHost` captures every diagnostic and prompt so tests can assert
//! on what the framework told the user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use provman_core::{BootstrapPrompt, HostApi, HostHandle};

/// A host that records what it is told and answers prompts from settings.
///
/// Defaults to interactive, approving every bootstrap, at call count 1.
pub struct RecordingHost {
    interactive: AtomicBool,
    approve: AtomicBool,
    call_count: AtomicU64,
    options: Mutex<HashMap<String, Vec<String>>>,
    debug: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, String)>>,
    prompts: Mutex<Vec<BootstrapPrompt>>,
    approve_untrusted: AtomicBool,
    untrusted: Mutex<Vec<(String, String)>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            interactive: AtomicBool::new(true),
            approve: AtomicBool::new(true),
            call_count: AtomicU64::new(1),
            options: Mutex::new(HashMap::new()),
            debug: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            approve_untrusted: AtomicBool::new(false),
            untrusted: Mutex::new(Vec::new()),
        })
    }

    pub fn non_interactive(self: Arc<Self>) -> Arc<Self> {
        self.interactive.store(false, Ordering::SeqCst);
        self
    }

    /// Sets the answer to bootstrap prompts.
    pub fn with_approval(self: Arc<Self>, approve: bool) -> Arc<Self> {
        self.approve.store(approve, Ordering::SeqCst);
        self
    }

    /// Sets the answer to untrusted-source prompts. Declined by default.
    pub fn with_untrusted_approval(self: Arc<Self>, approve: bool) -> Arc<Self> {
        self.approve_untrusted.store(approve, Ordering::SeqCst);
        self
    }

    pub fn with_option(self: Arc<Self>, key: &str, value: &str) -> Arc<Self> {
        self.options
            .lock()
            .unwrap()
            .entry(key.to_lowercase())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn handle(self: &Arc<Self>) -> HostHandle {
        Arc::clone(self) as HostHandle
    }

    pub fn set_call_count(&self, count: u64) {
        self.call_count.store(count, Ordering::SeqCst);
    }

    /// Starts a new top-level call and returns its id.
    pub fn next_call(&self) -> u64 {
        self.call_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn debug_messages(&self) -> Vec<String> {
        self.debug.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    /// Recorded errors as `(code, message)`.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<BootstrapPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    /// Untrusted-source prompts as `(source, location)`.
    pub fn untrusted_prompts(&self) -> Vec<(String, String)> {
        self.untrusted.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostApi for RecordingHost {
    fn debug(&self, message: &str) {
        self.debug.lock().unwrap().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, code: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push((code.to_string(), message.to_string()));
    }

    fn option_keys(&self) -> Vec<String> {
        self.options.lock().unwrap().keys().cloned().collect()
    }

    fn option_values(&self, key: &str) -> Vec<String> {
        self.options
            .lock()
            .unwrap()
            .get(&key.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn should_bootstrap_provider(&self, prompt: &BootstrapPrompt) -> bool {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.approve.load(Ordering::SeqCst)
    }

    async fn should_continue_with_untrusted_source(&self, source: &str, location: &str) -> bool {
        self.untrusted
            .lock()
            .unwrap()
            .push((source.to_string(), location.to_string()));
        self.approve_untrusted.load(Ordering::SeqCst)
    }
}
