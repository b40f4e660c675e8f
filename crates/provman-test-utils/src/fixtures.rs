// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closure-backed provider fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value as Json};

use provman_adapter::{DynamicObject, DynamicType};
use provman_core::{
    CandidateType, FourPartVersion, MemberSignature, ProvmanError, Result, SoftwareIdentity,
    Value, ValueKind,
};

use ValueKind::{Json as J, Object, String as S, StringList, Unit};

/// A package provider object named `name`, reporting `version` if given.
pub fn package_provider(name: &str, version: Option<&str>, features: Json) -> DynamicObject {
    let provider_name = name.to_string();
    let version = version.map(str::to_string);

    let mut builder = DynamicObject::builder(format!("{name}Provider"))
        .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
            Ok(Value::unit())
        })
        .method("get_package_provider_name", MemberSignature::new([], S), move |_, _| {
            let n = provider_name.clone();
            async move { Ok(Value::from(n)) }
        })
        .method("get_features", MemberSignature::new([], J), move |_, _| {
            let f = features.clone();
            async move { Ok(Value::from(f)) }
        })
        .method("find_package", MemberSignature::new([S, S, S, S], J), |_, _| async {
            Ok(Value::from(json!([])))
        });
    if let Some(v) = version {
        builder = builder.method("get_provider_version", MemberSignature::new([], S), move |_, _| {
            let v = v.clone();
            async move { Ok(Value::from(v)) }
        });
    }
    builder.build()
}

pub fn package_provider_type(name: &str, version: Option<&str>) -> Arc<dyn CandidateType> {
    package_provider_type_with_features(name, version, json!({}))
}

pub fn package_provider_type_with_features(
    name: &str,
    version: Option<&str>,
    features: Json,
) -> Arc<dyn CandidateType> {
    let n = name.to_string();
    let v = version.map(str::to_string);
    DynamicType::new(format!("{name}Provider"), move || {
        Ok(package_provider(&n, v.as_deref(), features.clone()))
    })
    .unwrap()
    .into_arc()
}

/// A package provider whose `initialize_provider` always fails.
pub fn failing_init_provider_type(name: &str) -> Arc<dyn CandidateType> {
    let n = name.to_string();
    DynamicType::new(format!("{name}Provider"), move || {
        let provider_name = n.clone();
        Ok(DynamicObject::builder(format!("{provider_name}Provider"))
            .method("initialize_provider", MemberSignature::new([], Unit), move |_, _| {
                let p = provider_name.clone();
                async move {
                    Err(ProvmanError::Initialization {
                        provider: p,
                        message: "refusing to start".to_string(),
                    })
                }
            })
            .method("get_package_provider_name", MemberSignature::new([], S), {
                let p = n.clone();
                move |_, _| {
                    let p = p.clone();
                    async move { Ok(Value::from(p)) }
                }
            })
            .build())
    })
    .unwrap()
    .into_arc()
}

pub fn archiver_type(name: &str) -> Arc<dyn CandidateType> {
    let n = name.to_string();
    DynamicType::new(format!("{name}Archiver"), move || {
        let archiver_name = n.clone();
        Ok(DynamicObject::builder(format!("{archiver_name}Archiver"))
            .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
                Ok(Value::unit())
            })
            .method("get_archiver_name", MemberSignature::new([], S), move |_, _| {
                let a = archiver_name.clone();
                async move { Ok(Value::from(a)) }
            })
            .method("unpack_archive", MemberSignature::new([S, S], StringList), |_, _| async {
                Ok(Value::from(Vec::<String>::new()))
            })
            .build())
    })
    .unwrap()
    .into_arc()
}

/// A meta-provider that can create one package provider per `(name, version)`.
pub fn meta_provider_type(meta_name: &str, children: &[(&str, &str)]) -> Arc<dyn CandidateType> {
    let meta = meta_name.to_string();
    let children: Vec<(String, String)> = children
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();

    DynamicType::new(format!("{meta_name}MetaProvider"), move || {
        let m = meta.clone();
        let names: Vec<String> = children.iter().map(|(n, _)| n.clone()).collect();
        let kids = children.clone();
        Ok(DynamicObject::builder(format!("{m}MetaProvider"))
            .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
                Ok(Value::unit())
            })
            .method("get_meta_provider_name", MemberSignature::new([], S), move |_, _| {
                let m = m.clone();
                async move { Ok(Value::from(m)) }
            })
            .method("get_provider_names", MemberSignature::new([], StringList), move |_, _| {
                let names = names.clone();
                async move { Ok(Value::from(names)) }
            })
            .method("create_provider", MemberSignature::new([S], Object), move |args, _| {
                let wanted = args.first().and_then(Json::as_str).unwrap_or_default().to_string();
                let found = kids
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(&wanted))
                    .cloned();
                async move {
                    Ok(match found {
                        Some((n, v)) => Value::Object(package_provider(&n, Some(&v), json!({})).into_arc()),
                        None => Value::unit(),
                    })
                }
            })
            .build())
    })
    .unwrap()
    .into_arc()
}

type InstallHook = Arc<dyn Fn(&SoftwareIdentity, Option<String>) -> Result<()> + Send + Sync>;

/// A stand-in for the builtin "Bootstrap" provider.
///
/// Offers a fixed list of packages and runs a hook on install. Counts
/// calls so tests can check how often the fallback fired.
#[derive(Default)]
pub struct FakeBootstrap {
    available: Mutex<Vec<SoftwareIdentity>>,
    hook: Mutex<Option<InstallHook>>,
    finds: AtomicUsize,
    installs: AtomicUsize,
}

impl FakeBootstrap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn offering(self: Arc<Self>, name: &str, version: &str) -> Arc<Self> {
        let identity = SoftwareIdentity {
            fast_package_reference: format!("{name}#{version}"),
            name: name.to_string(),
            version: version.to_string(),
            source: Some("Bootstrap".to_string()),
            links: vec![provman_core::Link {
                href: format!("https://cdn.example/{}.wasm", name.to_lowercase()),
                relationship: "installationmedia".to_string(),
                media_type: None,
                artifact: None,
            }],
            ..Default::default()
        };
        self.available.lock().unwrap().push(identity);
        self
    }

    /// Runs `hook(identity, destination)` on every install.
    pub fn on_install(
        self: Arc<Self>,
        hook: impl Fn(&SoftwareIdentity, Option<String>) -> Result<()> + Send + Sync + 'static,
    ) -> Arc<Self> {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
        self
    }

    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    pub fn candidate_type(self: &Arc<Self>) -> Arc<dyn CandidateType> {
        let this = Arc::clone(self);
        DynamicType::new("FakeBootstrap", move || Ok(this.object()))
            .unwrap()
            .into_arc()
    }

    fn object(self: &Arc<Self>) -> DynamicObject {
        let find = Arc::clone(self);
        let install = Arc::clone(self);
        DynamicObject::builder("FakeBootstrap")
            .method("initialize_provider", MemberSignature::new([], Unit), |_, _| async {
                Ok(Value::unit())
            })
            .method("get_package_provider_name", MemberSignature::new([], S), |_, _| async {
                Ok(Value::from("Bootstrap"))
            })
            .method("find_package", MemberSignature::new([S, S, S, S], J), move |args, _| {
                let result = find.find(&args);
                async move { result }
            })
            .method("install_package", MemberSignature::new([S], J), move |args, host| {
                let destination = host.option_values("destination").into_iter().next();
                let result = install.install(&args, destination);
                async move { result }
            })
            .build()
    }

    fn find(&self, args: &[Json]) -> Result<Value> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let name = args.first().and_then(Json::as_str).unwrap_or_default();
        let minimum: Option<FourPartVersion> = args
            .get(2)
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()?;
        let found: Vec<SoftwareIdentity> = self
            .available
            .lock()
            .unwrap()
            .iter()
            .filter(|i| name.is_empty() || i.name.eq_ignore_ascii_case(name))
            .filter(|i| match (minimum, i.four_part_version()) {
                (Some(min), Some(v)) => v >= min,
                _ => true,
            })
            .cloned()
            .collect();
        Ok(Value::from(serde_json::to_value(found).unwrap_or_default()))
    }

    fn install(&self, args: &[Json], destination: Option<String>) -> Result<Value> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        let reference = args.first().and_then(Json::as_str).unwrap_or_default();
        let identity = self
            .available
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.fast_package_reference == reference)
            .cloned()
            .ok_or_else(|| ProvmanError::BootstrapUnavailable(reference.to_string()))?;
        let hook = self.hook.lock().unwrap().clone();
        match hook {
            Some(hook) => {
                hook(&identity, destination)?;
                Ok(Value::from(serde_json::to_value(vec![identity]).unwrap_or_default()))
            }
            None => Ok(Value::from(json!([]))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_expose_expected_members() {
        let t = package_provider_type("Foo", Some("1.0"));
        assert_eq!(t.name(), "FooProvider");
        assert!(t.members().iter().any(|m| m.name == "get_provider_version"));

        let t = package_provider_type("Bar", None);
        assert!(!t.members().iter().any(|m| m.name == "get_provider_version"));

        let m = meta_provider_type("Meta", &[("Child", "1.0")]);
        assert!(m.members().iter().any(|m| m.name == "create_provider"));
    }

    #[tokio::test]
    async fn fake_bootstrap_filters_by_name_and_minimum() {
        let fake = FakeBootstrap::new().offering("Foo", "1.0").offering("Foo", "2.0");
        let found = fake
            .find(&[json!("foo"), json!(""), json!("1.5"), json!("")])
            .unwrap()
            .into_json()
            .unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(fake.find_calls(), 1);
    }
}
