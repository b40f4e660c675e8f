// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call bootstrap re-entrancy guard.

use std::collections::HashSet;
use std::sync::Mutex;

/// Provider names already attempted during the current top-level call.
///
/// The host's call counter only grows; seeing a higher value starts a new
/// call and forgets earlier attempts.
#[derive(Debug, Default)]
pub struct CallContext {
    inner: Mutex<CallState>,
}

#[derive(Debug, Default)]
struct CallState {
    last_call_id: u64,
    attempted: HashSet<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt for `name` in call `call_id`.
    ///
    /// Returns `false` when `name` was already attempted in this call.
    pub fn try_begin(&self, call_id: u64, name: &str) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if call_id > state.last_call_id {
            state.last_call_id = call_id;
            state.attempted.clear();
        }
        state.attempted.insert(name.to_lowercase())
    }
}
