// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sandboxed provider modules using wasmtime.
//!
//! A module's reflection surface comes from its sidecar manifest: each
//! declared type member `T.m` must be exported by the module as a function
//! named `"T.m"` taking and returning nothing. Arguments and results cross
//! the boundary as JSON through host functions in the `provman` namespace:
//!
//! - `log(level, ptr, len)`: routed to the host diagnostics by level
//! - `get_input_len() -> i32` and `get_input(ptr)`: the JSON argument array
//! - `set_output(ptr, len)`: the JSON result
//! - `is_cancelled() -> i32`
//!
//! A member returning an object writes `{"$type": "Name"}`; the host then
//! hands out an instance of that type from the same module.
//!
//! The [`Engine`] and compiled [`Module`] are shared. Every call gets a
//! fresh [`Store`] with its own fuel and epoch deadline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info};
use wasmtime::{Caller, Config, Engine, ExternType, Linker, Memory, Module, Store};

use provman_config::LoaderConfig;
use provman_core::{
    callable, Callable, CandidateObject, CandidateType, FourPartVersion, HostHandle,
    LoadedModule, MemberForm, MemberInfo, ModuleLoader, ModuleManifest, ModuleResources,
    ProvmanError, Result, TypeDecl, Value, ValueKind,
};

/// Key of the type name in an object-valued result.
pub const OBJECT_TYPE_KEY: &str = "$type";

/// Host error code for errors logged by a sandboxed provider.
const PROVIDER_ERROR: &str = "ProviderError";

/// State stored in each wasmtime Store for a single call.
struct CallState {
    host: HostHandle,
    input_json: String,
    result_json: Option<String>,
}

/// Loads `.wasm` provider modules.
pub struct WasmModuleLoader {
    engine: Engine,
    default_resources: ModuleResources,
}

impl WasmModuleLoader {
    /// Creates a loader whose engine meters fuel and honors epoch deadlines.
    pub fn new(default_resources: ModuleResources) -> Result<Self> {
        let mut config = Config::new();
        config.consume_fuel(true);
        config.epoch_interruption(true);

        let engine = Engine::new(&config).map_err(|e| {
            ProvmanError::Internal(format!("failed to create wasmtime engine: {e}"))
        })?;

        info!("WASM provider runtime initialized");
        Ok(Self {
            engine,
            default_resources,
        })
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        Self::new(ModuleResources {
            fuel: config.default_fuel,
            timeout_secs: config.default_timeout_secs,
        })
    }

    /// Manifests that leave `[resources]` at its defaults run with the
    /// loader's limits instead.
    fn resources_for(&self, manifest: &ModuleManifest) -> ModuleResources {
        if manifest.resources == ModuleResources::default() {
            self.default_resources.clone()
        } else {
            manifest.resources.clone()
        }
    }
}

#[async_trait]
impl ModuleLoader for WasmModuleLoader {
    fn name(&self) -> &str {
        "wasm"
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wasm"))
    }

    async fn load(
        &self,
        path: &Path,
        manifest: Option<&ModuleManifest>,
    ) -> Result<Arc<dyn LoadedModule>> {
        let load_err = |message: String| ProvmanError::ModuleLoad {
            path: path.to_path_buf(),
            message,
        };

        let manifest =
            manifest.ok_or_else(|| load_err("sandboxed modules require a manifest".to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| load_err(format!("failed to read module: {e}")))?;

        let engine = self.engine.clone();
        let module = tokio::task::spawn_blocking(move || Module::new(&engine, &bytes))
            .await
            .map_err(|e| load_err(format!("compile task panicked: {e}")))?
            .map_err(|e| load_err(format!("failed to compile WASM module: {e}")))?;

        for ty in &manifest.types {
            for member in &ty.members {
                let export = export_name(&ty.name, &member.name);
                if !matches!(module.get_export(&export), Some(ExternType::Func(_))) {
                    return Err(load_err(format!("declared member `{export}` is not exported")));
                }
            }
        }

        let shared = Arc::new(WasmShared {
            engine: self.engine.clone(),
            module,
            resources: self.resources_for(manifest),
            types: manifest.types.clone(),
        });
        let types = manifest
            .types
            .iter()
            .map(|decl| {
                Arc::new(WasmType {
                    shared: shared.clone(),
                    decl: decl.clone(),
                }) as Arc<dyn CandidateType>
            })
            .collect();

        info!(
            module = %path.display(),
            name = %manifest.name,
            version = %manifest.version,
            "loaded WASM provider module"
        );
        Ok(Arc::new(WasmLoadedModule {
            path: path.to_path_buf(),
            version: manifest.version,
            types,
        }))
    }
}

struct WasmLoadedModule {
    path: PathBuf,
    version: FourPartVersion,
    types: Vec<Arc<dyn CandidateType>>,
}

impl LoadedModule for WasmLoadedModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn version(&self) -> Option<FourPartVersion> {
        Some(self.version)
    }

    fn public_types(&self) -> Vec<Arc<dyn CandidateType>> {
        self.types.clone()
    }
}

/// Compiled module plus everything a call needs.
struct WasmShared {
    engine: Engine,
    module: Module,
    resources: ModuleResources,
    types: Vec<TypeDecl>,
}

fn export_name(type_name: &str, member: &str) -> String {
    format!("{type_name}.{member}")
}

struct WasmType {
    shared: Arc<WasmShared>,
    decl: TypeDecl,
}

impl CandidateType for WasmType {
    fn name(&self) -> &str {
        &self.decl.name
    }

    fn members(&self) -> Vec<MemberInfo> {
        self.decl.members.iter().map(|m| m.to_member_info()).collect()
    }

    fn has_default_constructor(&self) -> bool {
        self.decl.default_constructor
    }

    fn construct(&self) -> Result<Arc<dyn CandidateObject>> {
        if !self.decl.default_constructor {
            return Err(ProvmanError::Internal(format!(
                "type `{}` has no default constructor",
                self.decl.name
            )));
        }
        Ok(Arc::new(WasmObject {
            shared: self.shared.clone(),
            decl: self.decl.clone(),
        }))
    }
}

/// An instance of a module type. Stateless between calls.
#[derive(Clone)]
struct WasmObject {
    shared: Arc<WasmShared>,
    decl: TypeDecl,
}

impl WasmObject {
    fn member(&self, name: &str, form: MemberForm) -> Option<&provman_core::MemberDecl> {
        self.decl
            .members
            .iter()
            .find(|m| m.name == name && m.form == form)
    }

    async fn call(&self, member: &str, returns: ValueKind, args: Vec<serde_json::Value>, host: HostHandle) -> Result<Value> {
        let input_json = serde_json::to_string(&args).map_err(|e| ProvmanError::Invocation {
            member: member.to_string(),
            message: format!("failed to serialize arguments: {e}"),
        })?;
        let export = export_name(&self.decl.name, member);
        let output = run_export(&self.shared, &export, input_json, host).await?;

        let Some(output) = output else {
            return Ok(returns.default_value());
        };
        let json: serde_json::Value =
            serde_json::from_str(&output).map_err(|e| ProvmanError::Invocation {
                member: member.to_string(),
                message: format!("result is not valid JSON: {e}"),
            })?;

        if returns == ValueKind::Object {
            return Ok(self.object_result(&json));
        }
        Ok(Value::Data(json))
    }

    fn object_result(&self, json: &serde_json::Value) -> Value {
        let wanted = json.get(OBJECT_TYPE_KEY).and_then(|t| t.as_str());
        let decl = wanted.and_then(|name| self.shared.types.iter().find(|t| t.name == name));
        match decl {
            Some(decl) => Value::Object(Arc::new(WasmObject {
                shared: self.shared.clone(),
                decl: decl.clone(),
            })),
            None => Value::unit(),
        }
    }
}

#[async_trait]
impl CandidateObject for WasmObject {
    fn type_name(&self) -> &str {
        &self.decl.name
    }

    fn members(&self) -> Vec<MemberInfo> {
        self.decl.members.iter().map(|m| m.to_member_info()).collect()
    }

    fn field(&self, name: &str) -> Option<Callable> {
        let decl = self.member(name, MemberForm::CallableField)?;
        let member = decl.name.clone();
        let returns = decl.returns;
        let this = self.clone();
        Some(callable(move |args, host| {
            let this = this.clone();
            let member = member.clone();
            async move { this.call(&member, returns, args, host).await }
        }))
    }

    async fn invoke(
        &self,
        member: &str,
        args: Vec<serde_json::Value>,
        host: HostHandle,
    ) -> Result<Value> {
        let returns = self
            .member(member, MemberForm::Method)
            .map(|m| m.returns)
            .ok_or_else(|| ProvmanError::Invocation {
                member: member.to_string(),
                message: format!("type `{}` has no method `{member}`", self.decl.name),
            })?;
        self.call(member, returns, args, host).await
    }
}

/// Runs one export in a fresh store.
///
/// An epoch ticker background task increments the engine epoch every
/// second, so the call traps once it exceeds its timeout.
async fn run_export(
    shared: &WasmShared,
    export: &str,
    input_json: String,
    host: HostHandle,
) -> Result<Option<String>> {
    let state = CallState {
        host,
        input_json,
        result_json: None,
    };
    let mut store = Store::new(&shared.engine, state);

    store.set_fuel(shared.resources.fuel).map_err(|e| {
        ProvmanError::Internal(format!("failed to set fuel: {e}"))
    })?;

    store.epoch_deadline_trap();
    store.set_epoch_deadline(shared.resources.timeout_secs);

    let mut linker = Linker::new(&shared.engine);
    define_host_functions(&mut linker)?;

    let engine_clone = shared.engine.clone();
    let timeout_secs = shared.resources.timeout_secs;
    let ticker_handle = tokio::spawn(async move {
        for _ in 0..timeout_secs + 1 {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            engine_clone.increment_epoch();
        }
    });

    let module = shared.module.clone();
    let export_owned = export.to_string();

    // Blocking thread so the epoch ticker keeps advancing on the runtime.
    let wasm_result = tokio::task::spawn_blocking(move || {
        let instance = linker.instantiate(&mut store, &module)?;
        let func = instance
            .get_typed_func::<(), ()>(&mut store, &export_owned)
            .map_err(|e| anyhow!("module has no '{export_owned}' export: {e}"))?;
        func.call(&mut store, ())?;
        Ok::<Store<CallState>, anyhow::Error>(store)
    })
    .await
    .map_err(|e| ProvmanError::Invocation {
        member: export.to_string(),
        message: format!("WASM execution task panicked: {e}"),
    })?;

    ticker_handle.abort();

    match wasm_result {
        Ok(store) => {
            debug!(export, "WASM call completed");
            Ok(store.into_data().result_json)
        }
        Err(e) => {
            let error_msg = format!("{e:#}");
            let message = if error_msg.contains("all fuel consumed") {
                format!("exceeded fuel limit ({} fuel units): {error_msg}", shared.resources.fuel)
            } else if error_msg.contains("wasm trap: interrupt") {
                format!(
                    "exceeded wall-clock timeout ({}s): {error_msg}",
                    shared.resources.timeout_secs
                )
            } else {
                format!("execution error: {error_msg}")
            };
            Err(ProvmanError::Invocation {
                member: export.to_string(),
                message,
            })
        }
    }
}

fn define_host_functions(linker: &mut Linker<CallState>) -> Result<()> {
    linker
        .func_wrap(
            "provman",
            "log",
            |mut caller: Caller<'_, CallState>, level: i32, ptr: i32, len: i32| {
                let memory = match caller.get_export("memory") {
                    Some(wasmtime::Extern::Memory(mem)) => mem,
                    _ => return,
                };
                if let Some(msg) = read_string_from_memory(&memory, &caller, ptr, len) {
                    debug!(provider_log = %msg, level, "provider log");
                    let host = &caller.data().host;
                    match level {
                        0 | 1 => host.debug(&msg),
                        3 => host.warning(&msg),
                        4 => host.error(PROVIDER_ERROR, &msg),
                        _ => host.verbose(&msg),
                    }
                }
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            "provman",
            "get_input_len",
            |caller: Caller<'_, CallState>| -> i32 { caller.data().input_json.len() as i32 },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            "provman",
            "get_input",
            |mut caller: Caller<'_, CallState>, ptr: i32| {
                let input = caller.data().input_json.clone();
                let memory = match caller.get_export("memory") {
                    Some(wasmtime::Extern::Memory(mem)) => mem,
                    _ => return,
                };
                write_bytes_to_memory(&memory, &mut caller, ptr, input.as_bytes());
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            "provman",
            "set_output",
            |mut caller: Caller<'_, CallState>, ptr: i32, len: i32| -> std::result::Result<(), wasmtime::Error> {
                let memory = match caller.get_export("memory") {
                    Some(wasmtime::Extern::Memory(mem)) => mem,
                    _ => return Err(anyhow!("WASM module has no exported memory").into()),
                };
                match read_string_from_memory(&memory, &caller, ptr, len) {
                    Some(output) => {
                        caller.data_mut().result_json = Some(output);
                        Ok(())
                    }
                    None => Err(anyhow!("output is out of bounds or not UTF-8").into()),
                }
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            "provman",
            "is_cancelled",
            |caller: Caller<'_, CallState>| -> i32 { i32::from(caller.data().host.is_cancelled()) },
        )
        .map_err(linker_err)?;

    Ok(())
}

fn read_string_from_memory(
    memory: &Memory,
    caller: &Caller<'_, CallState>,
    ptr: i32,
    len: i32,
) -> Option<String> {
    let ptr = usize::try_from(ptr).ok()?;
    let len = usize::try_from(len).ok()?;
    let data = memory.data(caller);
    let end = ptr.checked_add(len)?;
    if end > data.len() {
        return None;
    }
    String::from_utf8(data[ptr..end].to_vec()).ok()
}

fn write_bytes_to_memory(
    memory: &Memory,
    caller: &mut Caller<'_, CallState>,
    ptr: i32,
    bytes: &[u8],
) {
    let Ok(ptr) = usize::try_from(ptr) else {
        return;
    };
    let data = memory.data_mut(caller);
    if ptr + bytes.len() <= data.len() {
        data[ptr..ptr + bytes.len()].copy_from_slice(bytes);
    }
}

fn linker_err(e: anyhow::Error) -> ProvmanError {
    ProvmanError::Internal(format!("failed to define host function: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_module_manifest;
    use provman_adapter::{ProviderContract, StructuralAdapter};
    use provman_test_utils::RecordingHost;
    use serde_json::json;

    const PROVIDER_WAT: &str = r#"(module
        (import "provman" "set_output" (func $set_output (param i32 i32)))
        (import "provman" "get_input_len" (func $get_input_len (result i32)))
        (import "provman" "get_input" (func $get_input (param i32)))
        (import "provman" "log" (func $log (param i32 i32 i32)))
        (memory (export "memory") 1)
        (data (i32.const 0) "\22Foo\22")
        (data (i32.const 16) "\222.5\22")
        (data (i32.const 32) "starting")
        (data (i32.const 64) "{\22$type\22:\22FooProvider\22}")
        (func (export "FooProvider.initialize_provider")
            (call $log (i32.const 3) (i32.const 32) (i32.const 8)))
        (func (export "FooProvider.get_package_provider_name")
            (call $set_output (i32.const 0) (i32.const 5)))
        (func (export "FooProvider.get_provider_version")
            (call $set_output (i32.const 16) (i32.const 5)))
        (func (export "FooProvider.find_package")
            (local $len i32)
            (local.set $len (call $get_input_len))
            (call $get_input (i32.const 1024))
            (call $set_output (i32.const 1024) (local.get $len)))
        (func (export "FooProvider.spin")
            (loop $forever (br $forever)))
        (func (export "FooProvider.clone_self")
            (call $set_output (i32.const 64) (i32.const 23)))
    )"#;

    const PROVIDER_MANIFEST: &str = r#"
[provider]
name = "foo"
version = "2.5"

[resources]
fuel = 100000
timeout_secs = 2

[[types]]
name = "FooProvider"

[[types.members]]
name = "initialize_provider"

[[types.members]]
name = "get_package_provider_name"
returns = "string"

[[types.members]]
name = "get_provider_version"
returns = "string"

[[types.members]]
name = "find_package"
params = ["string", "string", "string", "string"]
returns = "json"

[[types.members]]
name = "spin"

[[types.members]]
name = "clone_self"
returns = "object"
"#;

    async fn load_fixture() -> (tempfile::TempDir, Arc<dyn LoadedModule>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.wasm");
        std::fs::write(&path, wat::parse_str(PROVIDER_WAT).unwrap()).unwrap();
        let manifest = parse_module_manifest(PROVIDER_MANIFEST).unwrap();

        let loader = WasmModuleLoader::new(ModuleResources::default()).unwrap();
        assert!(loader.handles(&path));
        let module = loader.load(&path, Some(&manifest)).await.unwrap();
        (dir, module)
    }

    #[test]
    fn engine_has_fuel_and_epoch() {
        let loader = WasmModuleLoader::new(ModuleResources::default()).unwrap();
        let mut store = Store::new(
            &loader.engine,
            CallState {
                host: RecordingHost::new().handle(),
                input_json: "[]".to_string(),
                result_json: None,
            },
        );
        assert!(store.set_fuel(1000).is_ok());
        store.epoch_deadline_trap();
        store.set_epoch_deadline(5);
    }

    #[tokio::test]
    async fn module_adapts_to_package_provider() {
        let (_dir, module) = load_fixture().await;
        assert_eq!(module.version(), Some(FourPartVersion::new(2, 5, 0, 0)));

        let adapter = StructuralAdapter::new();
        let proxy = adapter
            .create_adapter(ProviderContract::package_provider(), &module.public_types())
            .unwrap();
        let recording = RecordingHost::new();
        let host = recording.handle();

        proxy
            .invoke("initialize_provider", vec![], host.clone())
            .await
            .unwrap();
        assert_eq!(recording.warnings(), vec!["starting"]);

        let name = proxy
            .call_string("get_package_provider_name", vec![], host.clone())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Foo"));

        let version = proxy
            .call_string("get_provider_version", vec![], host.clone())
            .await
            .unwrap();
        assert_eq!(version.as_deref(), Some("2.5"));
    }

    #[tokio::test]
    async fn arguments_round_trip_through_host_functions() {
        let (_dir, module) = load_fixture().await;
        let object = module.public_types()[0].construct().unwrap();
        let args = vec![json!("zlib"), json!(""), json!("1.0"), json!("")];
        let result = object
            .invoke("find_package", args.clone(), RecordingHost::new().handle())
            .await
            .unwrap();
        assert_eq!(result.into_json(), Some(json!(args)));
    }

    #[tokio::test]
    async fn fuel_exhaustion_is_an_invocation_error() {
        let (_dir, module) = load_fixture().await;
        let object = module.public_types()[0].construct().unwrap();
        let err = object
            .invoke("spin", vec![], RecordingHost::new().handle())
            .await
            .unwrap_err();
        match err {
            ProvmanError::Invocation { message, .. } => {
                assert!(message.contains("exceeded fuel limit"), "got: {message}");
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn object_results_become_instances() {
        let (_dir, module) = load_fixture().await;
        let object = module.public_types()[0].construct().unwrap();
        let value = object
            .invoke("clone_self", vec![], RecordingHost::new().handle())
            .await
            .unwrap();
        let child = value.into_object().expect("object result");
        assert_eq!(child.type_name(), "FooProvider");
    }

    #[tokio::test]
    async fn missing_export_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.wasm");
        std::fs::write(&path, wat::parse_str(PROVIDER_WAT).unwrap()).unwrap();
        let mut manifest = parse_module_manifest(PROVIDER_MANIFEST).unwrap();
        manifest.types[0].members.push(provman_core::MemberDecl {
            name: "uninstall_package".into(),
            params: vec![ValueKind::String],
            returns: ValueKind::Json,
            form: MemberForm::Method,
        });

        let loader = WasmModuleLoader::new(ModuleResources::default()).unwrap();
        let err = loader.load(&path, Some(&manifest)).await.err().unwrap();
        assert!(err.to_string().contains("FooProvider.uninstall_package"));
    }

    #[tokio::test]
    async fn manifest_is_required() {
        let loader = WasmModuleLoader::new(ModuleResources::default()).unwrap();
        let err = loader
            .load(Path::new("/nonexistent/foo.wasm"), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProvmanError::ModuleLoad { .. }));
    }
}
