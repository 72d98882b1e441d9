//! Guest module execution
//!
//! Compiles and instantiates a guest wasm binary with the browser's
//! WebAssembly API, wiring every import the module declares to its
//! [`HostOp`](crate::registry::HostOp) through one trampoline closure per
//! signature shape. The context is created only after instantiation, once
//! the guest's exported memory exists, so the closures hold a shared slot
//! that is filled in before `main` runs.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::context::CrtContext;
use crate::error::{CrtError, CrtResult};
use crate::memory::GuestMemory;
use crate::registry::{resolve, HostOp, Sig, Value};

/// Context slot shared between the runner and the import closures
pub type SharedContext = Rc<RefCell<Option<CrtContext>>>;

/// Result of one guest run
pub struct RunOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
}

/// Compiles, instantiates and drives one guest module
pub struct GuestRunner {
    state: SharedContext,
}

impl Default for GuestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestRunner {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(None)),
        }
    }

    /// Run a guest binary to completion: compile, wire imports,
    /// instantiate, call `main`, run atexit handlers
    pub async fn run(&self, module_bytes: &[u8]) -> CrtResult<RunOutcome> {
        let module = compile_module(module_bytes).await?;
        let imports = self.build_imports(&module)?;
        let instance = instantiate_module(&module, &imports).await?;
        let exports = instance.exports();

        let memory = get_export::<WebAssembly::Memory>(&exports, "memory", "Memory")?;
        let mut ctx = CrtContext::new(GuestMemory::from_export(memory));
        if let Ok(base) = Reflect::get(&exports, &JsValue::from_str("__heap_base")) {
            if let Some(global) = base.dyn_ref::<WebAssembly::Global>() {
                ctx.set_heap_start(global.value().as_f64().unwrap_or(0.0) as u32);
            }
        }
        *self.state.borrow_mut() = Some(ctx);

        let main_fn = get_export::<Function>(&exports, "main", "Function")?;
        let result = main_fn.call0(&JsValue::NULL);

        let exit_code = match result {
            Ok(val) => val.as_f64().unwrap_or(0.0) as i32,
            Err(e) => {
                let exited = self
                    .state
                    .borrow()
                    .as_ref()
                    .and_then(|ctx| ctx.exit_code());
                match exited {
                    Some(code) => code,
                    None => {
                        let reason = e
                            .as_string()
                            .unwrap_or_else(|| "unknown trap".to_string());
                        return Err(CrtError::Trap { reason });
                    }
                }
            }
        };

        self.run_atexit_handlers(&exports);

        let mut guard = self.state.borrow_mut();
        let ctx = guard.as_mut().ok_or(CrtError::InstantiationFailed {
            reason: "context dropped during run".to_string(),
        })?;
        let final_code = ctx.exit_code().unwrap_or(exit_code);
        Ok(RunOutcome {
            exit_code: final_code,
            stdout: ctx.take_stdout(),
        })
    }

    /// Call the exit handlers the recorded exit kind selects (atexit for a
    /// normal exit, at_quick_exit after quick_exit, none after abort), most
    /// recent first, through the guest's indirect function table
    fn run_atexit_handlers(&self, exports: &Object) {
        let handlers = match self.state.borrow_mut().as_mut() {
            Some(ctx) => ctx.take_exit_handlers(),
            None => return,
        };
        if handlers.is_empty() {
            return;
        }
        let table =
            match get_export::<WebAssembly::Table>(exports, "__indirect_function_table", "Table") {
                Ok(table) => table,
                Err(err) => {
                    crate::console_log!("atexit handlers skipped: {}", err);
                    return;
                }
            };
        for index in handlers {
            match table.get(index) {
                Ok(func) => {
                    if let Err(e) = func.call0(&JsValue::NULL) {
                        crate::console_log!(
                            "atexit handler {} trapped: {:?}",
                            index,
                            e.as_string()
                        );
                    }
                }
                Err(_) => {
                    crate::console_log!("atexit handler {} not in function table", index);
                }
            }
        }
    }

    /// Build the import object by resolving every import the module
    /// declares against the registry
    fn build_imports(&self, module: &WebAssembly::Module) -> CrtResult<Object> {
        let imports = Object::new();
        let env = Object::new();

        let declared = WebAssembly::Module::imports(module);
        for entry in declared.iter() {
            let name = Reflect::get(&entry, &JsValue::from_str("name"))
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_default();
            let kind = Reflect::get(&entry, &JsValue::from_str("kind"))
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_default();
            if kind != "function" {
                continue;
            }
            let op = resolve(&name).ok_or(CrtError::UnknownImport { name: name.clone() })?;
            attach_import(&env, &name, op, Rc::clone(&self.state))?;
        }

        Reflect::set(&imports, &JsValue::from_str("env"), &env).map_err(|_| {
            CrtError::InstantiationFailed {
                reason: "failed to set env imports".to_string(),
            }
        })?;

        Ok(imports)
    }
}

/// Compile wasm bytecode into a module
async fn compile_module(bytes: &[u8]) -> CrtResult<WebAssembly::Module> {
    let array = Uint8Array::new_with_length(bytes.len() as u32);
    array.copy_from(bytes);

    let promise = WebAssembly::compile(&array.buffer());
    let result = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| CrtError::InstantiationFailed {
            reason: e
                .as_string()
                .unwrap_or_else(|| "compilation failed".to_string()),
        })?;

    result
        .dyn_into::<WebAssembly::Module>()
        .map_err(|_| CrtError::InstantiationFailed {
            reason: "failed to cast to Module".to_string(),
        })
}

async fn instantiate_module(
    module: &WebAssembly::Module,
    imports: &Object,
) -> CrtResult<WebAssembly::Instance> {
    let promise = WebAssembly::instantiate_module(module, imports);
    let result = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| CrtError::InstantiationFailed {
            reason: e
                .as_string()
                .unwrap_or_else(|| "instantiation failed".to_string()),
        })?;

    result
        .dyn_into::<WebAssembly::Instance>()
        .map_err(|_| CrtError::InstantiationFailed {
            reason: "failed to cast to Instance".to_string(),
        })
}

fn get_export<T: JsCast>(
    exports: &Object,
    name: &'static str,
    expected: &'static str,
) -> CrtResult<T> {
    let value = Reflect::get(exports, &JsValue::from_str(name))
        .map_err(|_| CrtError::MissingExport { name })?;
    if value.is_undefined() {
        return Err(CrtError::MissingExport { name });
    }
    value
        .dyn_into::<T>()
        .map_err(|_| CrtError::WrongExportType { name, expected })
}

/// Run one op against the shared context; traps out to JS on fatal errors
fn dispatch(state: &SharedContext, op: HostOp, args: &[Value]) -> Option<Value> {
    let result = {
        let mut guard = state.borrow_mut();
        match guard.as_mut() {
            Some(ctx) => ctx.invoke(op, args),
            None => Err(CrtError::InstantiationFailed {
                reason: format!("'{}' called before instantiation", op.name()),
            }),
        }
    };
    match result {
        Ok(value) => value,
        Err(err) => wasm_bindgen::throw_str(&err.to_string()),
    }
}

fn ret_f64(value: Option<Value>) -> f64 {
    match value {
        Some(Value::F64(x)) => x,
        Some(Value::I32(x)) => x as f64,
        Some(Value::I64(x)) => x as f64,
        None => 0.0,
    }
}

fn ret_i32(value: Option<Value>) -> i32 {
    match value {
        Some(Value::I32(x)) => x,
        Some(Value::I64(x)) => x as i32,
        Some(Value::F64(x)) => x as i32,
        None => 0,
    }
}

fn ret_i64(value: Option<Value>) -> i64 {
    match value {
        Some(Value::I64(x)) => x,
        Some(Value::I32(x)) => x as i64,
        Some(Value::F64(x)) => x as i64,
        None => 0,
    }
}

/// Wire one import name to its op with a closure of the right shape
fn attach_import(env: &Object, name: &str, op: HostOp, state: SharedContext) -> CrtResult<()> {
    macro_rules! import {
        ($shape:ty, $body:expr) => {{
            let closure = Closure::wrap(Box::new($body) as Box<$shape>);
            Reflect::set(env, &JsValue::from_str(name), closure.as_ref()).map_err(|_| {
                CrtError::InstantiationFailed {
                    reason: format!("failed to set '{}' import", name),
                }
            })?;
            closure.forget();
        }};
    }

    match op.signature() {
        Sig::F64ToF64 => import!(dyn Fn(f64) -> f64, move |x: f64| {
            ret_f64(dispatch(&state, op, &[Value::F64(x)]))
        }),
        Sig::F64F64ToF64 => import!(dyn Fn(f64, f64) -> f64, move |x: f64, y: f64| {
            ret_f64(dispatch(&state, op, &[Value::F64(x), Value::F64(y)]))
        }),
        Sig::F64F64F64ToF64 => {
            import!(dyn Fn(f64, f64, f64) -> f64, move |x: f64, y: f64, z: f64| {
                ret_f64(dispatch(
                    &state,
                    op,
                    &[Value::F64(x), Value::F64(y), Value::F64(z)],
                ))
            })
        }
        Sig::F64I32ToF64 => import!(dyn Fn(f64, i32) -> f64, move |x: f64, p: i32| {
            ret_f64(dispatch(&state, op, &[Value::F64(x), Value::I32(p)]))
        }),
        Sig::F64F64I32ToF64 => {
            import!(dyn Fn(f64, f64, i32) -> f64, move |x: f64, y: f64, p: i32| {
                ret_f64(dispatch(
                    &state,
                    op,
                    &[Value::F64(x), Value::F64(y), Value::I32(p)],
                ))
            })
        }
        Sig::F64ToI32 => import!(dyn Fn(f64) -> i32, move |x: f64| {
            ret_i32(dispatch(&state, op, &[Value::F64(x)]))
        }),
        Sig::F64ToI64 => import!(dyn Fn(f64) -> i64, move |x: f64| {
            ret_i64(dispatch(&state, op, &[Value::F64(x)]))
        }),
        Sig::I32ToF64 => import!(dyn Fn(i32) -> f64, move |a: i32| {
            ret_f64(dispatch(&state, op, &[Value::I32(a)]))
        }),
        Sig::I32I32ToF64 => import!(dyn Fn(i32, i32) -> f64, move |a: i32, b: i32| {
            ret_f64(dispatch(&state, op, &[Value::I32(a), Value::I32(b)]))
        }),
        Sig::I32I32I32ToI32 => {
            import!(dyn Fn(i32, i32, i32) -> i32, move |a: i32, b: i32, c: i32| {
                ret_i32(dispatch(
                    &state,
                    op,
                    &[Value::I32(a), Value::I32(b), Value::I32(c)],
                ))
            })
        }
        Sig::I32ToI32 => import!(dyn Fn(i32) -> i32, move |a: i32| {
            ret_i32(dispatch(&state, op, &[Value::I32(a)]))
        }),
        Sig::I32I32ToI32 => import!(dyn Fn(i32, i32) -> i32, move |a: i32, b: i32| {
            ret_i32(dispatch(&state, op, &[Value::I32(a), Value::I32(b)]))
        }),
        Sig::I32ToNone => import!(dyn Fn(i32), move |a: i32| {
            dispatch(&state, op, &[Value::I32(a)]);
        }),
        Sig::I32ToI64 => import!(dyn Fn(i32) -> i64, move |a: i32| {
            ret_i64(dispatch(&state, op, &[Value::I32(a)]))
        }),
        Sig::I64ToI32 => import!(dyn Fn(i64) -> i32, move |a: i64| {
            ret_i32(dispatch(&state, op, &[Value::I64(a)]))
        }),
        Sig::I64ToI64 => import!(dyn Fn(i64) -> i64, move |a: i64| {
            ret_i64(dispatch(&state, op, &[Value::I64(a)]))
        }),
        Sig::NoneToF64 => import!(dyn Fn() -> f64, move || {
            ret_f64(dispatch(&state, op, &[]))
        }),
        Sig::NoneToI32 => import!(dyn Fn() -> i32, move || {
            ret_i32(dispatch(&state, op, &[]))
        }),
        Sig::NoneToI64 => import!(dyn Fn() -> i64, move || {
            ret_i64(dispatch(&state, op, &[]))
        }),
        Sig::NoneToNone => import!(dyn Fn(), move || {
            dispatch(&state, op, &[]);
        }),
    }

    Ok(())
}
