// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! provman - discover, load and bootstrap provider plugins.
//!
//! This is the binary entry point. It loads configuration, builds a
//! `ProviderManager` with the builtin core module and the WASM loader, and
//! runs one subcommand against it.

mod commands;
mod host;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use host::ConsoleHost;

/// provman - provider plugin manager.
#[derive(Parser, Debug)]
#[command(name = "provman", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Approve every bootstrap prompt.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Never prompt; missing providers are not bootstrapped.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List every registered provider.
    List,
    /// Select package providers by name or wildcard pattern.
    Select {
        /// Provider name, or a pattern using `*` and `?`.
        pattern: String,
    },
    /// Make sure a package provider is available, bootstrapping it if needed.
    Require {
        name: String,
        /// Minimum acceptable version (up to four parts).
        #[arg(long)]
        min_version: Option<String>,
    },
    /// Print registered and bootstrappable provider names.
    Names,
    /// Search selected providers for a package.
    Find {
        package: String,
        /// Provider name or pattern; all providers when omitted.
        #[arg(long, default_value = "")]
        provider: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => provman_config::load_and_validate_path(path),
        None => provman_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            provman_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    let console = ConsoleHost::new(cli.yes, cli.non_interactive, !cli.plain);
    let host = console.handle();
    {
        let console = console.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                console.cancel();
            }
        });
    }

    let manager = match commands::build_manager(&config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("provman: {e}");
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("provman: use --help for available commands");
        return;
    };

    console.begin_call();
    manager.load_providers(&host).await;

    let use_color = !cli.plain;
    let outcome = match command {
        Commands::List => {
            commands::list(&manager, use_color).await;
            Ok(true)
        }
        Commands::Select { pattern } => {
            commands::select(&manager, &pattern, &host, use_color).await
        }
        Commands::Require { name, min_version } => {
            commands::require(&manager, &name, min_version.as_deref(), &host).await
        }
        Commands::Names => {
            commands::names(&manager, &host).await;
            Ok(true)
        }
        Commands::Find { package, provider } => {
            commands::find(&manager, &package, &provider, &host).await
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("provman: {e}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("provman={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_require_with_minimum() {
        let cli = Cli::parse_from(["provman", "--yes", "require", "Foo", "--min-version", "2.1"]);
        assert!(cli.yes);
        match cli.command {
            Some(Commands::Require { name, min_version }) => {
                assert_eq!(name, "Foo");
                assert_eq!(min_version.as_deref(), Some("2.1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = provman_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.loader.workers, 8);
    }
}
