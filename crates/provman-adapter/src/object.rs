// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closure-backed candidate objects and types.
//!
//! Builtin providers, meta-provider products, and test doubles are all
//! expressed as [`DynamicObject`]s: a type name plus a table of methods and
//! callable fields. They go through the same matching as sandboxed modules.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use provman_core::{
    callable, Callable, CandidateObject, CandidateType, HostHandle, MemberInfo, MemberSignature,
    ProvmanError, Result, Value,
};

type MemberFilter = Arc<dyn Fn(&str) -> Option<bool> + Send + Sync>;
type Factory = Arc<dyn Fn() -> Result<DynamicObject> + Send + Sync>;

/// An object whose members are closures.
#[derive(Clone)]
pub struct DynamicObject {
    type_name: String,
    methods: Vec<(MemberInfo, Callable)>,
    fields: Vec<(MemberInfo, Callable)>,
    member_filter: Option<MemberFilter>,
}

impl DynamicObject {
    pub fn builder(type_name: impl Into<String>) -> DynamicObjectBuilder {
        DynamicObjectBuilder {
            object: DynamicObject {
                type_name: type_name.into(),
                methods: Vec::new(),
                fields: Vec::new(),
                member_filter: None,
            },
        }
    }

    pub fn into_arc(self) -> Arc<dyn CandidateObject> {
        Arc::new(self)
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicObject")
            .field("type_name", &self.type_name)
            .field(
                "methods",
                &self.methods.iter().map(|(m, _)| &m.name).collect::<Vec<_>>(),
            )
            .field(
                "fields",
                &self.fields.iter().map(|(m, _)| &m.name).collect::<Vec<_>>(),
            )
            .field("member_filter", &self.member_filter.is_some())
            .finish()
    }
}

/// Builder for [`DynamicObject`].
pub struct DynamicObjectBuilder {
    object: DynamicObject,
}

impl DynamicObjectBuilder {
    /// Adds a public method.
    pub fn method<F, Fut>(mut self, name: &str, signature: MemberSignature, f: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>, HostHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.object
            .methods
            .push((MemberInfo::method(name, signature), callable(f)));
        self
    }

    /// Adds a public callable-valued field.
    pub fn field<F, Fut>(mut self, name: &str, signature: MemberSignature, f: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>, HostHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.object
            .fields
            .push((MemberInfo::field(name, signature), callable(f)));
        self
    }

    /// Installs a member filter; returning `Some(false)` declines a member.
    pub fn member_filter(
        mut self,
        f: impl Fn(&str) -> Option<bool> + Send + Sync + 'static,
    ) -> Self {
        self.object.member_filter = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> DynamicObject {
        self.object
    }
}

#[async_trait]
impl CandidateObject for DynamicObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn members(&self) -> Vec<MemberInfo> {
        self.methods
            .iter()
            .chain(self.fields.iter())
            .map(|(info, _)| info.clone())
            .collect()
    }

    fn supports_member(&self, name: &str) -> Option<bool> {
        self.member_filter.as_ref().and_then(|f| f(name))
    }

    fn field(&self, name: &str) -> Option<Callable> {
        self.fields
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, c)| c.clone())
    }

    async fn invoke(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Value> {
        let body = self
            .methods
            .iter()
            .find(|(info, _)| info.name == member)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| ProvmanError::Invocation {
                member: member.to_string(),
                message: format!("type `{}` has no method `{member}`", self.type_name),
            })?;
        body(args, host).await
    }
}

/// A candidate type backed by a factory closure.
pub struct DynamicType {
    name: String,
    members: Vec<MemberInfo>,
    factory: Option<Factory>,
}

impl DynamicType {
    /// A default-constructible type. One prototype is built up front to
    /// read the member table.
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn() -> Result<DynamicObject> + Send + Sync + 'static,
    ) -> Result<Self> {
        let prototype = factory()?;
        Ok(Self {
            name: name.into(),
            members: prototype.members(),
            factory: Some(Arc::new(factory)),
        })
    }

    /// A type with the given shape but no default constructor.
    pub fn without_constructor(name: impl Into<String>, members: Vec<MemberInfo>) -> Self {
        Self {
            name: name.into(),
            members,
            factory: None,
        }
    }

    pub fn into_arc(self) -> Arc<dyn CandidateType> {
        Arc::new(self)
    }
}

impl fmt::Debug for DynamicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicType")
            .field("name", &self.name)
            .field("members", &self.members.len())
            .field("default_constructor", &self.factory.is_some())
            .finish()
    }
}

impl CandidateType for DynamicType {
    fn name(&self) -> &str {
        &self.name
    }

    fn members(&self) -> Vec<MemberInfo> {
        self.members.clone()
    }

    fn has_default_constructor(&self) -> bool {
        self.factory.is_some()
    }

    fn construct(&self) -> Result<Arc<dyn CandidateObject>> {
        let factory = self.factory.as_ref().ok_or_else(|| ProvmanError::IncompatibleType {
            contract: String::new(),
            type_name: self.name.clone(),
            message: "type has no default constructor".to_string(),
        })?;
        Ok(factory()?.into_arc())
    }
}
