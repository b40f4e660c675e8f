// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry.
//!
//! One map per category, keyed by the case-folded provider name. A
//! registration replaces an existing entry only when its version is
//! strictly higher; the entry lock is held just for that compare-and-replace.

use std::ops::Deref;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use provman_core::FourPartVersion;

use crate::providers::{Archiver, Downloader, MetaProvider, PackageProvider, ProviderHandle};

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    Replaced { previous: FourPartVersion },
    /// An equal or higher version is already registered.
    Rejected { existing: FourPartVersion },
}

impl RegisterOutcome {
    pub fn is_registered(&self) -> bool {
        !matches!(self, RegisterOutcome::Rejected { .. })
    }
}

/// Name-keyed providers of one category.
pub struct CategoryMap<T> {
    entries: DashMap<String, T>,
}

impl<T> Default for CategoryMap<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> CategoryMap<T>
where
    T: Clone + Deref<Target = ProviderHandle>,
{
    /// Registers `provider`, keeping whichever version is highest.
    pub fn register(&self, provider: T) -> RegisterOutcome {
        let key = provider.name.to_lowercase();
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(provider);
                RegisterOutcome::Added
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get().version;
                if provider.version > existing {
                    debug!(
                        provider = %provider.name,
                        from = %existing,
                        to = %provider.version,
                        "replacing provider with newer version"
                    );
                    slot.insert(provider);
                    RegisterOutcome::Replaced { previous: existing }
                } else {
                    RegisterOutcome::Rejected { existing }
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.get(&name.to_lowercase()).map(|e| e.value().clone())
    }

    /// All providers, ordered by name.
    pub fn all(&self) -> Vec<T> {
        let mut all: Vec<T> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|p| p.name.to_lowercase());
        all
    }

    /// Display names, ordered.
    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Active providers of every category.
#[derive(Default)]
pub struct ProviderRegistry {
    pub package_providers: CategoryMap<PackageProvider>,
    pub archivers: CategoryMap<Archiver>,
    pub downloaders: CategoryMap<Downloader>,
    pub meta_providers: CategoryMap<MetaProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}
