// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider contracts: the fixed member sets the host calls.
//!
//! Each contract starts with the common provider members, then adds the
//! category's own. Members flagged `required` decide compatibility; all
//! other members degrade to stubs when a candidate lacks them.

use std::sync::LazyLock;

use provman_core::{MemberSignature, ProviderCategory, ValueKind};

/// Reserved member synthesized on every adapter.
pub const IS_IMPLEMENTED: &str = "is_implemented";

/// One member of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractMember {
    pub name: String,
    pub signature: MemberSignature,
    pub required: bool,
}

impl ContractMember {
    fn new(name: &str, params: &[ValueKind], returns: ValueKind, required: bool) -> Self {
        Self {
            name: name.to_string(),
            signature: MemberSignature::new(params.to_vec(), returns),
            required,
        }
    }
}

/// An immutable, named set of members for one provider category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContract {
    name: String,
    category: ProviderCategory,
    members: Vec<ContractMember>,
}

impl ProviderContract {
    /// Builds a contract. The reserved `is_implemented` member is never
    /// listed; every adapter answers it.
    pub fn new(name: &str, category: ProviderCategory, members: Vec<ContractMember>) -> Self {
        let members = members
            .into_iter()
            .filter(|m| !m.name.eq_ignore_ascii_case(IS_IMPLEMENTED))
            .collect();
        Self {
            name: name.to_string(),
            category,
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ProviderCategory {
        self.category
    }

    pub fn members(&self) -> &[ContractMember] {
        &self.members
    }

    /// Case-insensitive member lookup.
    pub fn member(&self, name: &str) -> Option<&ContractMember> {
        self.members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn required_members(&self) -> impl Iterator<Item = &ContractMember> {
        self.members.iter().filter(|m| m.required)
    }

    pub fn package_provider() -> &'static ProviderContract {
        &PACKAGE_PROVIDER
    }

    pub fn archiver() -> &'static ProviderContract {
        &ARCHIVER
    }

    pub fn downloader() -> &'static ProviderContract {
        &DOWNLOADER
    }

    pub fn meta_provider() -> &'static ProviderContract {
        &META_PROVIDER
    }

    pub fn for_category(category: ProviderCategory) -> &'static ProviderContract {
        match category {
            ProviderCategory::PackageProvider => Self::package_provider(),
            ProviderCategory::Archiver => Self::archiver(),
            ProviderCategory::Downloader => Self::downloader(),
            ProviderCategory::MetaProvider => Self::meta_provider(),
        }
    }
}

use ValueKind::{Bool, Json, Object, String as Str, StringList, Unit};

fn common_members() -> Vec<ContractMember> {
    vec![
        ContractMember::new("initialize_provider", &[], Unit, true),
        ContractMember::new("get_provider_version", &[], Str, false),
        ContractMember::new("get_features", &[], Json, false),
        ContractMember::new("get_dynamic_options", &[Str], Json, false),
    ]
}

static PACKAGE_PROVIDER: LazyLock<ProviderContract> = LazyLock::new(|| {
    let mut members = common_members();
    members.extend([
        ContractMember::new("get_package_provider_name", &[], Str, true),
        ContractMember::new("add_package_source", &[Str, Str, Bool], Unit, false),
        ContractMember::new("remove_package_source", &[Str], Unit, false),
        ContractMember::new("get_package_sources", &[], Json, false),
        ContractMember::new("find_package", &[Str, Str, Str, Str], Json, false),
        ContractMember::new("find_package_by_file", &[Str], Json, false),
        ContractMember::new("find_package_by_uri", &[Str], Json, false),
        ContractMember::new("get_installed_packages", &[Str], Json, false),
        ContractMember::new("download_package", &[Str, Str], Json, false),
        ContractMember::new("get_package_dependencies", &[Str], Json, false),
        ContractMember::new("get_package_details", &[Str], Json, false),
        ContractMember::new("install_package", &[Str], Json, false),
        ContractMember::new("uninstall_package", &[Str], Json, false),
    ]);
    ProviderContract::new("PackageProvider", ProviderCategory::PackageProvider, members)
});

static ARCHIVER: LazyLock<ProviderContract> = LazyLock::new(|| {
    let mut members = common_members();
    members.extend([
        ContractMember::new("get_archiver_name", &[], Str, true),
        ContractMember::new("unpack_archive", &[Str, Str], StringList, true),
        ContractMember::new("is_supported_file", &[Str], Bool, false),
    ]);
    ProviderContract::new("Archiver", ProviderCategory::Archiver, members)
});

static DOWNLOADER: LazyLock<ProviderContract> = LazyLock::new(|| {
    let mut members = common_members();
    members.extend([
        ContractMember::new("get_downloader_name", &[], Str, true),
        ContractMember::new("supported_schemes", &[], StringList, true),
        ContractMember::new("download_file", &[Str, Str], Str, true),
    ]);
    ProviderContract::new("Downloader", ProviderCategory::Downloader, members)
});

static META_PROVIDER: LazyLock<ProviderContract> = LazyLock::new(|| {
    let mut members = common_members();
    members.extend([
        ContractMember::new("get_meta_provider_name", &[], Str, true),
        ContractMember::new("get_provider_names", &[], StringList, true),
        ContractMember::new("create_provider", &[Str], Object, true),
    ]);
    ProviderContract::new("MetaProvider", ProviderCategory::MetaProvider, members)
});
