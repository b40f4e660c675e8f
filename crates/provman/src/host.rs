// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal host: diagnostics to stderr and tracing, prompts on stdin.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use tracing::{debug, error, info, warn};

use provman_core::{BootstrapPrompt, HostApi, HostHandle};

pub struct ConsoleHost {
    assume_yes: bool,
    interactive: bool,
    use_color: bool,
    call_count: AtomicU64,
    cancelled: AtomicBool,
}

impl ConsoleHost {
    pub fn new(assume_yes: bool, non_interactive: bool, use_color: bool) -> Arc<Self> {
        Arc::new(Self {
            assume_yes,
            interactive: !non_interactive && (assume_yes || std::io::stdin().is_terminal()),
            use_color,
            call_count: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Marks the start of a new top-level command.
    pub fn begin_call(&self) -> u64 {
        self.call_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn handle(self: &Arc<Self>) -> HostHandle {
        Arc::clone(self) as HostHandle
    }

    async fn confirm(&self, question: String) -> bool {
        if self.assume_yes {
            return true;
        }
        if !self.interactive {
            return false;
        }
        let answer = tokio::task::spawn_blocking(move || {
            eprint!("{question} [y/N] ");
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

#[async_trait]
impl HostApi for ConsoleHost {
    fn debug(&self, message: &str) {
        debug!(target: "provman::host", "{message}");
    }

    fn verbose(&self, message: &str) {
        info!(target: "provman::host", "{message}");
    }

    fn warning(&self, message: &str) {
        warn!(target: "provman::host", "{message}");
        if self.use_color {
            eprintln!("{} {message}", "warning:".yellow());
        } else {
            eprintln!("warning: {message}");
        }
    }

    fn error(&self, code: &str, message: &str) {
        error!(target: "provman::host", code, "{message}");
        if self.use_color {
            eprintln!("{} {message} ({code})", "error:".red());
        } else {
            eprintln!("error: {message} ({code})");
        }
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    async fn should_bootstrap_provider(&self, prompt: &BootstrapPrompt) -> bool {
        let question = format!(
            "Provider '{}' {} is required. Download it from {} and install it to {}?",
            prompt.provider_name, prompt.provider_version, prompt.location, prompt.destination
        );
        self.confirm(question).await
    }

    async fn should_continue_with_untrusted_source(&self, source: &str, location: &str) -> bool {
        self.confirm(format!("Source '{source}' ({location}) is not trusted. Continue?"))
            .await
    }
}
