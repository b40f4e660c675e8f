// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.

use std::sync::Arc;

use colored::Colorize;

use provman_config::ProvmanConfig;
use provman_core::{DownloadTransport, FourPartVersion, HostHandle, ProvmanError, Result};
use provman_plugin::{
    BuiltinModule, BuiltinModuleLoader, PackageProvider, ProviderManager, WasmModuleLoader,
};

/// Builds a manager with the builtin core module and the WASM loader.
pub fn build_manager(config: &ProvmanConfig) -> Result<ProviderManager> {
    let transport: Arc<dyn DownloadTransport> =
        Arc::new(provman_bootstrap::HttpsTransport::new()?);
    let core_version: FourPartVersion = env!("CARGO_PKG_VERSION").parse()?;
    let core = BuiltinModule::new(
        "core",
        core_version,
        provman_bootstrap::core_module_types(config, transport, None)?,
    );

    Ok(ProviderManager::builder(config.clone())
        .module_loader(Arc::new(BuiltinModuleLoader::new().with_module(core)))
        .module_loader(Arc::new(WasmModuleLoader::from_config(&config.loader)?))
        .build())
}

fn print_providers(title: &str, rows: Vec<(String, FourPartVersion, String)>, use_color: bool) {
    println!();
    if use_color {
        println!("  {}", title.bold());
    } else {
        println!("  {title}");
    }
    println!("  {}", "-".repeat(50));
    if rows.is_empty() {
        println!("    (none)");
    }
    for (name, version, origin) in rows {
        println!("    {name:<20} {version:<12} {origin}");
    }
}

fn package_rows(providers: &[PackageProvider]) -> Vec<(String, FourPartVersion, String)> {
    providers
        .iter()
        .map(|p| (p.name.clone(), p.version, p.module_path.display().to_string()))
        .collect()
}

pub async fn list(manager: &ProviderManager, use_color: bool) {
    let registry = manager.registry();
    print_providers(
        "Package providers",
        package_rows(&registry.package_providers.all()),
        use_color,
    );
    print_providers(
        "Archivers",
        manager
            .archivers()
            .iter()
            .map(|a| (a.name.clone(), a.version, a.module_path.display().to_string()))
            .collect(),
        use_color,
    );
    print_providers(
        "Downloaders",
        manager
            .downloaders()
            .iter()
            .map(|d| (d.name.clone(), d.version, d.module_path.display().to_string()))
            .collect(),
        use_color,
    );
    print_providers(
        "Meta-providers",
        registry
            .meta_providers
            .all()
            .iter()
            .map(|m| (m.name.clone(), m.version, m.module_path.display().to_string()))
            .collect(),
        use_color,
    );
}

pub async fn select(
    manager: &ProviderManager,
    pattern: &str,
    host: &HostHandle,
    use_color: bool,
) -> Result<bool> {
    let selected = manager.select_providers(pattern, host).await?;
    let found = !selected.is_empty();
    print_providers("Selected providers", package_rows(&selected), use_color);
    Ok(found)
}

pub async fn require(
    manager: &ProviderManager,
    name: &str,
    min_version: Option<&str>,
    host: &HostHandle,
) -> Result<bool> {
    let minimum = min_version
        .map(|v| {
            v.parse::<FourPartVersion>()
                .map_err(|_| ProvmanError::InvalidArgument(format!("invalid version '{v}'")))
        })
        .transpose()?;
    let available = manager
        .require_package_provider("provman", name, minimum, host)
        .await?;
    if available {
        println!("provider '{name}' is available");
    } else {
        println!("provider '{name}' is not available");
    }
    Ok(available)
}

pub async fn names(manager: &ProviderManager, host: &HostHandle) {
    for name in manager.all_provider_names(host).await {
        println!("{name}");
    }
}

/// Searches every selected provider for `package`.
pub async fn find(
    manager: &ProviderManager,
    package: &str,
    provider: &str,
    host: &HostHandle,
) -> Result<bool> {
    let mut any = false;
    for p in manager.select_providers(provider, host).await? {
        let found = p.find_package(package, "", "", "", host).await?;
        for identity in found {
            any = true;
            println!(
                "{:<20} {:<12} {:<16} {}",
                identity.name,
                identity.version,
                p.name,
                identity.summary.unwrap_or_default()
            );
        }
    }
    Ok(any)
}
