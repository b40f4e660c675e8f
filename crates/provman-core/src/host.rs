// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host API: the callback surface the embedding application gives to
//! the framework and, through it, to every provider call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Shared handle to a host implementation.
pub type HostHandle = Arc<dyn HostApi>;

/// Details shown to the user before a provider is bootstrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPrompt {
    /// Who asked for the provider (a module name, a command, or empty).
    pub requestor: String,
    pub provider_name: String,
    pub provider_version: String,
    pub provider_type: String,
    /// Where the artifact will be downloaded from.
    pub location: String,
    /// Where the artifact will be installed.
    pub destination: String,
}

/// Callbacks from the framework into the embedding host.
///
/// Diagnostics and progress have no-op defaults so that minimal hosts only
/// implement the decisions they care about.
#[async_trait]
pub trait HostApi: Send + Sync + 'static {
    fn debug(&self, _message: &str) {}

    fn verbose(&self, _message: &str) {}

    fn warning(&self, message: &str);

    /// Reports an error with a stable category code such as `UnknownProvider`.
    fn error(&self, code: &str, message: &str);

    /// Starts a progress activity and returns its id.
    fn start_progress(&self, _parent_id: u32, _message: &str) -> u32 {
        0
    }

    fn progress(&self, _activity_id: u32, _percent: u8, _message: &str) {}

    fn complete_progress(&self, _activity_id: u32, _succeeded: bool) {}

    /// Keys of the dynamic options supplied by the caller.
    fn option_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Values for a dynamic option, matched case-insensitively.
    fn option_values(&self, _key: &str) -> Vec<String> {
        Vec::new()
    }

    /// Whether the host can prompt a user.
    fn is_interactive(&self) -> bool;

    fn is_cancelled(&self) -> bool {
        false
    }

    /// Monotonically increasing id of the current top-level call.
    fn call_count(&self) -> u64;

    /// Asks for consent to download and install a missing provider.
    async fn should_bootstrap_provider(&self, prompt: &BootstrapPrompt) -> bool;

    /// Asks whether to keep going with a package source that is not trusted.
    async fn should_continue_with_untrusted_source(&self, _source: &str, _location: &str) -> bool {
        false
    }
}

/// A host wrapper that layers extra dynamic options over an inner host.
///
/// Used to hand a provider call options the original caller never set,
/// such as the install destination during bootstrap.
pub struct OptionOverlay {
    inner: HostHandle,
    options: HashMap<String, Vec<String>>,
}

impl OptionOverlay {
    pub fn new(inner: HostHandle) -> Self {
        Self {
            inner,
            options: HashMap::new(),
        }
    }

    /// Adds an option. Keys are stored lowercased.
    pub fn with_option(mut self, key: &str, values: Vec<String>) -> Self {
        self.options.insert(key.to_lowercase(), values);
        self
    }

    pub fn into_handle(self) -> HostHandle {
        Arc::new(self)
    }
}

#[async_trait]
impl HostApi for OptionOverlay {
    fn debug(&self, message: &str) {
        self.inner.debug(message);
    }

    fn verbose(&self, message: &str) {
        self.inner.verbose(message);
    }

    fn warning(&self, message: &str) {
        self.inner.warning(message);
    }

    fn error(&self, code: &str, message: &str) {
        self.inner.error(code, message);
    }

    fn start_progress(&self, parent_id: u32, message: &str) -> u32 {
        self.inner.start_progress(parent_id, message)
    }

    fn progress(&self, activity_id: u32, percent: u8, message: &str) {
        self.inner.progress(activity_id, percent, message);
    }

    fn complete_progress(&self, activity_id: u32, succeeded: bool) {
        self.inner.complete_progress(activity_id, succeeded);
    }

    fn option_keys(&self) -> Vec<String> {
        let mut keys = self.inner.option_keys();
        for key in self.options.keys() {
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                keys.push(key.clone());
            }
        }
        keys
    }

    fn option_values(&self, key: &str) -> Vec<String> {
        match self.options.get(&key.to_lowercase()) {
            Some(values) => values.clone(),
            None => self.inner.option_values(key),
        }
    }

    fn is_interactive(&self) -> bool {
        self.inner.is_interactive()
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    fn call_count(&self) -> u64 {
        self.inner.call_count()
    }

    async fn should_bootstrap_provider(&self, prompt: &BootstrapPrompt) -> bool {
        self.inner.should_bootstrap_provider(prompt).await
    }

    async fn should_continue_with_untrusted_source(&self, source: &str, location: &str) -> bool {
        self.inner
            .should_continue_with_untrusted_source(source, location)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct QuietHost;

    #[async_trait]
    impl HostApi for QuietHost {
        fn warning(&self, _message: &str) {}
        fn error(&self, _code: &str, _message: &str) {}
        fn option_values(&self, key: &str) -> Vec<String> {
            if key.eq_ignore_ascii_case("scope") {
                vec!["user".into()]
            } else {
                Vec::new()
            }
        }
        fn option_keys(&self) -> Vec<String> {
            vec!["scope".into()]
        }
        fn is_interactive(&self) -> bool {
            true
        }
        fn call_count(&self) -> u64 {
            7
        }
        async fn should_bootstrap_provider(&self, _prompt: &BootstrapPrompt) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn overlay_adds_options_and_delegates_the_rest() {
        let overlay = OptionOverlay::new(Arc::new(QuietHost))
            .with_option("Destination", vec!["/tmp/providers".into()])
            .into_handle();

        assert_eq!(overlay.option_values("destination"), vec!["/tmp/providers"]);
        assert_eq!(overlay.option_values("scope"), vec!["user"]);
        assert_eq!(overlay.option_keys().len(), 2);
        assert_eq!(overlay.call_count(), 7);
        assert!(overlay.is_interactive());

        let prompt = BootstrapPrompt {
            requestor: String::new(),
            provider_name: "Foo".into(),
            provider_version: "1.0.0.0".into(),
            provider_type: "PackageProvider".into(),
            location: "https://example.test/foo.wasm".into(),
            destination: "/tmp/providers".into(),
        };
        assert!(overlay.should_bootstrap_provider(&prompt).await);
        assert!(
            !overlay
                .should_continue_with_untrusted_source("s", "l")
                .await
        );
    }

    #[test]
    fn overlay_overrides_inner_value() {
        let overlay = OptionOverlay::new(Arc::new(QuietHost))
            .with_option("scope", vec!["machine".into()]);
        assert_eq!(overlay.option_values("SCOPE"), vec!["machine"]);
    }
}
