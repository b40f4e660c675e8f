// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shape matching between a contract and one candidate's reflection surface.

use std::sync::Arc;

use provman_core::{MemberForm, MemberInfo};

use crate::contract::ProviderContract;

/// Identity of a concrete shape: type name plus every member signature.
///
/// Two candidates with equal keys resolve identically against any contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey(String);

impl ShapeKey {
    pub fn of(type_name: &str, members: &[MemberInfo]) -> Self {
        let mut parts: Vec<String> = members
            .iter()
            .map(|m| {
                let form = match m.form {
                    MemberForm::Method => "m",
                    MemberForm::CallableField => "f",
                };
                format!("{form}:{}{}", m.name, m.signature)
            })
            .collect();
        parts.sort();
        ShapeKey(format!("{type_name}{{{}}}", parts.join(";")))
    }
}

/// Where a contract member was found on a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMatch {
    /// The candidate's own spelling of the member name.
    pub actual_name: String,
    pub form: MemberForm,
}

/// Match table for one (contract, shape) pair, indexed like
/// `contract.members()`.
pub type ShapePlan = Arc<Vec<Option<MemberMatch>>>;

/// Matches every contract member against a candidate's members.
///
/// Names compare case-insensitively and signatures must be identical.
/// Methods win over callable fields of the same name.
pub fn match_shape(contract: &ProviderContract, members: &[MemberInfo]) -> Vec<Option<MemberMatch>> {
    contract
        .members()
        .iter()
        .map(|wanted| {
            let find = |form: MemberForm| {
                members.iter().find(|m| {
                    m.form == form
                        && m.name.eq_ignore_ascii_case(&wanted.name)
                        && m.signature == wanted.signature
                })
            };
            find(MemberForm::Method)
                .or_else(|| find(MemberForm::CallableField))
                .map(|m| MemberMatch {
                    actual_name: m.name.clone(),
                    form: m.form,
                })
        })
        .collect()
}
