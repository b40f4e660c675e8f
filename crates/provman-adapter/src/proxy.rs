// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The adapter proxy: a contract-shaped dispatcher over candidate objects.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use tracing::debug;

use provman_core::{Callable, CandidateObject, HostHandle, ProvmanError, Result, Value};

use crate::contract::{ProviderContract, IS_IMPLEMENTED};

/// How one contract member is served.
#[derive(Clone)]
pub enum Resolution {
    /// Forward to a method on a candidate.
    DirectCall {
        target: Arc<dyn CandidateObject>,
        member: String,
    },
    /// Call a callable-valued field read at build time.
    DelegateCall(Callable),
    /// No candidate supplies the member; return the kind's default.
    Stub,
}

impl Resolution {
    pub fn is_stub(&self) -> bool {
        matches!(self, Resolution::Stub)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::DirectCall { target, member } => f
                .debug_struct("DirectCall")
                .field("target", &target.type_name())
                .field("member", member)
                .finish(),
            Resolution::DelegateCall(_) => f.write_str("DelegateCall"),
            Resolution::Stub => f.write_str("Stub"),
        }
    }
}

/// An object implementing a [`ProviderContract`] on top of candidates.
///
/// Resolutions are fixed when the proxy is built; calls never re-match.
#[derive(Clone)]
pub struct AdapterProxy {
    contract: Arc<ProviderContract>,
    resolutions: Vec<Resolution>,
    candidate_types: Vec<String>,
}

impl AdapterProxy {
    pub(crate) fn new(
        contract: Arc<ProviderContract>,
        resolutions: Vec<Resolution>,
        candidate_types: Vec<String>,
    ) -> Self {
        Self {
            contract,
            resolutions,
            candidate_types,
        }
    }

    pub fn contract(&self) -> &ProviderContract {
        &self.contract
    }

    /// Type names of the wrapped candidates, in chaining order.
    pub fn candidate_types(&self) -> &[String] {
        &self.candidate_types
    }

    pub fn resolution(&self, member: &str) -> Option<&Resolution> {
        self.index_of(member).map(|i| &self.resolutions[i])
    }

    /// Whether `member` is a real forward rather than a stub.
    ///
    /// Answers from the build-time table without calling anything.
    pub fn is_implemented(&self, member: &str) -> bool {
        if member.eq_ignore_ascii_case(IS_IMPLEMENTED) {
            return true;
        }
        self.resolution(member).is_some_and(|r| !r.is_stub())
    }

    fn index_of(&self, member: &str) -> Option<usize> {
        self.contract
            .members()
            .iter()
            .position(|m| m.name.eq_ignore_ascii_case(member))
    }

    /// Calls a contract member.
    ///
    /// Errors and panics raised by the candidate are contained and returned
    /// as [`ProvmanError::Invocation`].
    pub async fn invoke(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Value> {
        if member.eq_ignore_ascii_case(IS_IMPLEMENTED) {
            let name = args.first().and_then(|a| a.as_str()).unwrap_or_default();
            return Ok(Value::from(self.is_implemented(name)));
        }

        let idx = self.index_of(member).ok_or_else(|| {
            ProvmanError::InvalidArgument(format!(
                "`{member}` is not a member of contract `{}`",
                self.contract.name()
            ))
        })?;
        let wanted = &self.contract.members()[idx];
        if args.len() != wanted.signature.params.len() {
            return Err(ProvmanError::InvalidArgument(format!(
                "`{member}` takes {} argument(s), got {}",
                wanted.signature.params.len(),
                args.len()
            )));
        }

        let call = match &self.resolutions[idx] {
            Resolution::Stub => return Ok(wanted.signature.returns.default_value()),
            Resolution::DirectCall { target, member: actual } => {
                let target = target.clone();
                let actual = actual.clone();
                async move { target.invoke(&actual, args, host).await }.boxed()
            }
            Resolution::DelegateCall(f) => f(args, host),
        };

        debug!(contract = %self.contract.name(), member = %wanted.name, "forwarding call");
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ProvmanError::Invocation { message, .. })) => Err(ProvmanError::Invocation {
                member: wanted.name.clone(),
                message,
            }),
            Ok(Err(e)) => Err(e),
            Err(panic) => Err(ProvmanError::Invocation {
                member: wanted.name.clone(),
                message: format!("candidate panicked: {}", panic_message(panic.as_ref())),
            }),
        }
    }

    /// Calls a string-returning member; null becomes `None`.
    pub async fn call_string(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Option<String>> {
        let value = self.invoke(member, args, host).await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn call_bool(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<bool> {
        let value = self.invoke(member, args, host).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn call_string_list(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Vec<String>> {
        let value = self.invoke(member, args, host).await?;
        Ok(value.to_string_list())
    }

    /// Calls a JSON-returning member and deserializes the result.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Option<T>> {
        let value = self.invoke(member, args, host).await?;
        match value.into_json() {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(json) => serde_json::from_value(json).map(Some).map_err(|e| {
                ProvmanError::Invocation {
                    member: member.to_string(),
                    message: format!("unexpected result shape: {e}"),
                }
            }),
        }
    }

    pub async fn call_object(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Option<Arc<dyn CandidateObject>>> {
        let value = self.invoke(member, args, host).await?;
        Ok(value.into_object())
    }
}

impl fmt::Debug for AdapterProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterProxy")
            .field("contract", &self.contract.name())
            .field("candidates", &self.candidate_types)
            .field(
                "implemented",
                &self
                    .contract
                    .members()
                    .iter()
                    .zip(&self.resolutions)
                    .filter(|(_, r)| !r.is_stub())
                    .map(|(m, _)| m.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
