// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reflection surface of plugin objects and types.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::host::HostHandle;
use crate::types::{MemberInfo, Value};

/// A callable value: a method body or the value of a callable field.
pub type Callable =
    Arc<dyn Fn(Vec<serde_json::Value>, HostHandle) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wraps an async closure into a [`Callable`].
pub fn callable<F, Fut>(f: F) -> Callable
where
    F: Fn(Vec<serde_json::Value>, HostHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |args, host| Box::pin(f(args, host)))
}

/// A live plugin object of unknown concrete shape.
///
/// The framework only reads its reflection surface and forwards calls; it
/// never mutates or copies the object.
#[async_trait]
pub trait CandidateObject: Send + Sync + 'static {
    /// Name of the concrete type this object was constructed from.
    fn type_name(&self) -> &str;

    /// Public methods and callable fields.
    fn members(&self) -> Vec<MemberInfo>;

    /// Optional filter letting the object decline a member it nominally has.
    ///
    /// `None` means the object has no filter and every listed member counts.
    fn supports_member(&self, _name: &str) -> Option<bool> {
        None
    }

    /// Reads a callable-valued field.
    fn field(&self, _name: &str) -> Option<Callable> {
        None
    }

    /// Invokes a public method by its declared name.
    async fn invoke(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Value>;
}

/// A public type exported by a loaded module.
pub trait CandidateType: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Members every instance of this type exposes.
    fn members(&self) -> Vec<MemberInfo>;

    fn has_default_constructor(&self) -> bool;

    /// Constructs an instance with the default constructor.
    fn construct(&self) -> Result<Arc<dyn CandidateObject>>;
}
