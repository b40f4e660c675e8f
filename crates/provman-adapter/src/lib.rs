// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural interface adapter.
//!
//! Lets the host call an arbitrary plugin object as if it implemented a
//! fixed [`ProviderContract`], as long as the object's shape is compatible.
//! Matching is by member name (case-insensitive) and identical signature;
//! a method or a callable-valued field both qualify. Members no candidate
//! supplies become stubs returning the kind's zero value, so adapting never
//! fails because of a missing optional member.
//!
//! With several candidates (chaining), the first one in argument order that
//! supplies a member serves it.
//!
//! # Usage
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use provman_adapter::{ProviderContract, StructuralAdapter};
//! # fn demo(candidate: Arc<dyn provman_core::CandidateObject>) -> provman_core::Result<()> {
//! let adapter = StructuralAdapter::new();
//! let proxy = adapter.build_adapter(ProviderContract::package_provider(), &[candidate])?;
//! assert!(proxy.is_implemented("is_implemented"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod contract;
pub mod object;
pub mod plan;
pub mod proxy;

use std::sync::Arc;

use tracing::debug;

use provman_core::{CandidateObject, CandidateType, MemberForm, ProvmanError, Result};

pub use contract::{ContractMember, ProviderContract, IS_IMPLEMENTED};
pub use object::{DynamicObject, DynamicObjectBuilder, DynamicType};
pub use plan::{MemberMatch, ShapeKey, ShapePlan};
pub use proxy::{AdapterProxy, Resolution};

use cache::CowCache;
use plan::match_shape;

/// Builds adapter proxies and caches per-shape match plans.
///
/// One instance is shared by every loader worker. Both caches are keyed by
/// contract name and concrete shape, so structurally identical candidates
/// never re-run matching.
pub struct StructuralAdapter {
    plans: CowCache<(String, ShapeKey), ShapePlan>,
    compatibility: CowCache<(String, Vec<ShapeKey>), bool>,
}

impl StructuralAdapter {
    pub fn new() -> Self {
        Self {
            plans: CowCache::new(),
            compatibility: CowCache::new(),
        }
    }

    fn plan_for(
        &self,
        contract: &ProviderContract,
        type_name: &str,
        members: &[provman_core::MemberInfo],
    ) -> ShapePlan {
        let key = (contract.name().to_string(), ShapeKey::of(type_name, members));
        self.plans
            .get_or_insert_with(key, || Arc::new(match_shape(contract, members)))
    }

    /// True when the types together supply every required member.
    pub fn is_compatible(&self, contract: &ProviderContract, types: &[Arc<dyn CandidateType>]) -> bool {
        if types.is_empty() {
            return false;
        }
        let shapes: Vec<ShapeKey> = types
            .iter()
            .map(|t| ShapeKey::of(t.name(), &t.members()))
            .collect();
        let key = (contract.name().to_string(), shapes);

        self.compatibility.get_or_insert_with(key, || {
            let plans: Vec<ShapePlan> = types
                .iter()
                .map(|t| self.plan_for(contract, t.name(), &t.members()))
                .collect();
            contract.members().iter().enumerate().all(|(i, m)| {
                !m.required || plans.iter().any(|p| p[i].is_some())
            })
        })
    }

    /// Instance-level compatibility, honoring each candidate's member filter.
    pub fn can_adapt(
        &self,
        contract: &ProviderContract,
        instances: &[Arc<dyn CandidateObject>],
    ) -> bool {
        if instances.is_empty() {
            return false;
        }
        let plans: Vec<ShapePlan> = instances
            .iter()
            .map(|c| self.plan_for(contract, c.type_name(), &c.members()))
            .collect();
        contract.members().iter().enumerate().all(|(i, m)| {
            !m.required
                || instances.iter().zip(&plans).any(|(c, p)| {
                    p[i].is_some() && c.supports_member(&m.name) != Some(false)
                })
        })
    }

    /// Builds a proxy over live candidates.
    ///
    /// Fails only when `candidates` is empty.
    pub fn build_adapter(
        &self,
        contract: &ProviderContract,
        candidates: &[Arc<dyn CandidateObject>],
    ) -> Result<AdapterProxy> {
        if candidates.is_empty() {
            return Err(ProvmanError::IncompatibleType {
                contract: contract.name().to_string(),
                type_name: String::new(),
                message: "no candidate instances supplied".to_string(),
            });
        }

        let plans: Vec<ShapePlan> = candidates
            .iter()
            .map(|c| self.plan_for(contract, c.type_name(), &c.members()))
            .collect();

        let resolutions = contract
            .members()
            .iter()
            .enumerate()
            .map(|(i, wanted)| {
                for (candidate, plan) in candidates.iter().zip(&plans) {
                    let Some(found) = &plan[i] else { continue };
                    if candidate.supports_member(&wanted.name) == Some(false) {
                        continue;
                    }
                    match found.form {
                        MemberForm::Method => {
                            return Resolution::DirectCall {
                                target: candidate.clone(),
                                member: found.actual_name.clone(),
                            };
                        }
                        MemberForm::CallableField => {
                            if let Some(f) = candidate.field(&found.actual_name) {
                                return Resolution::DelegateCall(f);
                            }
                        }
                    }
                }
                Resolution::Stub
            })
            .collect();

        let candidate_types: Vec<String> =
            candidates.iter().map(|c| c.type_name().to_string()).collect();
        debug!(contract = %contract.name(), candidates = ?candidate_types, "built adapter");

        Ok(AdapterProxy::new(
            Arc::new(contract.clone()),
            resolutions,
            candidate_types,
        ))
    }

    /// Constructs one instance per type with its default constructor, then
    /// builds a proxy over them.
    pub fn create_adapter(
        &self,
        contract: &ProviderContract,
        types: &[Arc<dyn CandidateType>],
    ) -> Result<AdapterProxy> {
        if types.is_empty() {
            return Err(ProvmanError::IncompatibleType {
                contract: contract.name().to_string(),
                type_name: String::new(),
                message: "no candidate types supplied".to_string(),
            });
        }
        if let Some(t) = types.iter().find(|t| !t.has_default_constructor()) {
            return Err(ProvmanError::IncompatibleType {
                contract: contract.name().to_string(),
                type_name: t.name().to_string(),
                message: "type has no default constructor".to_string(),
            });
        }

        let instances = types
            .iter()
            .map(|t| t.construct())
            .collect::<Result<Vec<_>>>()?;
        self.build_adapter(contract, &instances)
    }

    /// Number of cached (contract, shape) plans.
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }
}

impl Default for StructuralAdapter {
    fn default() -> Self {
        Self::new()
    }
}
