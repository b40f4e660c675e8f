// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only copy-on-write cache.
//!
//! Readers load the current snapshot without locking. Writers serialize on
//! a mutex, check the snapshot again, and publish a new map. Entries are
//! never removed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

pub struct CowCache<K, V> {
    snapshot: ArcSwap<HashMap<K, V>>,
    write_lock: Mutex<()>,
}

impl<K, V> CowCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.snapshot.load().get(key).cloned()
    }

    /// Returns the cached value or computes, stores, and returns it.
    ///
    /// `compute` runs at most once per key even under contention.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(v) = self.get(&key) {
            return v;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();
        if let Some(v) = current.get(&key) {
            return v.clone();
        }

        let value = compute();
        let mut next = HashMap::clone(&current);
        next.insert(key, value.clone());
        self.snapshot.store(Arc::new(next));
        value
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.load().len()
    }
}

impl<K, V> Default for CowCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
