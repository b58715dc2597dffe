//! Host function dispatch.
//!
//! Every host function is exposed to scripts as an engine function object
//! created with the same native entry point, [`host_trampoline`]. The
//! trampoline reads the callee's registered name, looks the host function up in the
//! engine's [`DispatchTable`], roots the arguments, and runs it. Lookup
//! happens on every call, so re-registering a name takes effect for bindings
//! script code already holds.
//!
//! Two hidden, read-only, non-deletable properties on the function object
//! carry the routing data: the registered name, and the address of the
//! owning engine's shared state. The script-visible `name` is never consulted,
//! since scripts may delete or redefine it.

use std::collections::HashMap;
use std::ffi::CString;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use jsbridge_sys::*;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::engine::{Engine, EngineInner, Scope};
use crate::error::{BridgeError, BridgeResult};
use crate::string::JsString;
use crate::value::{Value, property_number, property_string};

/// A host function callable from script code.
pub type HostFn = Arc<dyn Fn(&Engine, &[Value]) -> BridgeResult<Value> + Send + Sync>;

const ENGINE_KEY: &str = "__jsbridge_engine";
const NAME_KEY: &str = "__jsbridge_name";

const HIDDEN: JSPropertyAttributes = K_JS_PROPERTY_ATTRIBUTE_DONT_ENUM
    | K_JS_PROPERTY_ATTRIBUTE_READ_ONLY
    | K_JS_PROPERTY_ATTRIBUTE_DONT_DELETE;

/// Name-keyed registry of host functions, owned by one engine.
#[derive(Default)]
pub(crate) struct DispatchTable {
    entries: RwLock<HashMap<String, HostFn>>,
}

impl DispatchTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns whether a previous entry was replaced.
    pub(crate) fn register(&self, name: &str, function: HostFn) -> bool {
        self.entries
            .write()
            .insert(name.to_string(), function)
            .is_some()
    }

    /// Clone the entry out so no table lock is held while it runs.
    pub(crate) fn lookup(&self, name: &str) -> Option<HostFn> {
        self.entries.read().get(name).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Create the engine-side binding for `name` on the global object.
///
/// # Safety
/// Called with the scope's lock held.
pub(crate) unsafe fn bind(scope: &Scope<'_>, name: &str) -> BridgeResult<()> {
    let ctx = scope.ctx();
    let js_name = JsString::new(name)?;
    let engine_addr = Arc::as_ptr(scope.inner()) as usize;

    // SAFETY: lock held; all strings outlive the calls
    unsafe {
        let function =
            JSObjectMakeFunctionWithCallback(ctx, js_name.raw(), Some(host_trampoline));

        set_hidden(ctx, function, ENGINE_KEY, JSValueMakeNumber(ctx, engine_addr as f64))?;
        set_hidden(ctx, function, NAME_KEY, JSValueMakeString(ctx, js_name.raw()))?;

        let mut exception: JSValueRef = ptr::null_mut();
        JSObjectSetProperty(
            ctx,
            scope.global(),
            js_name.raw(),
            function as JSValueRef,
            K_JS_PROPERTY_ATTRIBUTE_NONE,
            &mut exception,
        );
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property(name.to_string()));
        }
    }

    Ok(())
}

/// # Safety
/// Lock held; `function` and `value` live in `ctx`.
unsafe fn set_hidden(
    ctx: JSContextRef,
    function: JSObjectRef,
    key: &str,
    value: JSValueRef,
) -> BridgeResult<()> {
    let js_key = JsString::new(key)?;
    let mut exception: JSValueRef = ptr::null_mut();
    // SAFETY: per caller contract
    unsafe { JSObjectSetProperty(ctx, function, js_key.raw(), value, HIDDEN, &mut exception) };
    if !exception.is_null() {
        return Err(BridgeError::Property(key.to_string()));
    }
    Ok(())
}

/// The single native entry point for every host function.
unsafe extern "C" fn host_trampoline(
    ctx: JSContextRef,
    function: JSObjectRef,
    _this_object: JSObjectRef,
    argument_count: usize,
    arguments: *const JSValueRef,
    exception: *mut JSValueRef,
) -> JSValueRef {
    // SAFETY: the engine passes a live context, callee and argument array
    unsafe {
        let Some(inner) = engine_for_function(ctx, function) else {
            *exception = thrown_string(ctx, "host function is not bound to an engine");
            return JSValueMakeUndefined(ctx);
        };
        let Some(name) = property_string(ctx, function, NAME_KEY) else {
            *exception = thrown_string(ctx, "host function has no registered name");
            return JSValueMakeUndefined(ctx);
        };

        match dispatch(&inner, &name, argument_count, arguments) {
            Ok(value) => value,
            Err(message) => {
                *exception = thrown_string(ctx, &message);
                JSValueMakeUndefined(ctx)
            }
        }
    }
}

/// Run the host function registered as `name`. The error is the text thrown
/// into script.
///
/// # Safety
/// Inside a trampoline call for `inner`; `arguments` holds `argument_count`
/// live values.
unsafe fn dispatch(
    inner: &Arc<EngineInner>,
    name: &str,
    argument_count: usize,
    arguments: *const JSValueRef,
) -> Result<JSValueRef, String> {
    // Script only runs inside an engine operation, so this nests.
    let scope = inner.enter();

    let Some(function) = inner.dispatch().lookup(name) else {
        warn!(name, "script called an unregistered host function");
        return Err(BridgeError::UnknownFunction(name.to_string()).to_string());
    };

    let args: Vec<Value> = (0..argument_count)
        // SAFETY: per caller contract
        .map(|i| scope.wrap(unsafe { *arguments.add(i) }))
        .collect();

    inner.stats().callbacks.fetch_add(1, Ordering::Relaxed);
    trace!(name, argc = argument_count, "dispatching host function");

    let engine = scope.engine();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| function(&engine, &args)));

    match outcome {
        Ok(Ok(result)) => {
            if !Arc::ptr_eq(result.handle().engine(), inner) {
                return Err(format!("host function '{name}' returned a value from another engine"));
            }
            // `result` is dropped after this returns; its root is released no
            // earlier than the outermost scope, after the engine has the value.
            Ok(result.raw())
        }
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(name, reason, "host function panicked");
            Err(format!("host function '{name}' panicked: {reason}"))
        }
    }
}

/// # Safety
/// Lock held; `function` live in `ctx`.
unsafe fn engine_for_function(
    ctx: JSContextRef,
    function: JSObjectRef,
) -> Option<Arc<EngineInner>> {
    // SAFETY: per caller contract
    let addr = unsafe { property_number(ctx, function, ENGINE_KEY)? };
    if !addr.is_finite() || addr <= 0.0 {
        return None;
    }
    let ptr = addr as usize as *const EngineInner;

    // SAFETY:
    // - `ptr` is the address of an `Arc<EngineInner>` stored by `bind`.
    // - Script only runs inside an operation that holds a strong reference,
    //   so the count is at least one; we add our own before adopting it.
    unsafe {
        Arc::increment_strong_count(ptr);
        Some(Arc::from_raw(ptr))
    }
}

/// A string primitive to throw. Failures are never wrapped in Error objects.
///
/// # Safety
/// Lock held.
unsafe fn thrown_string(ctx: JSContextRef, message: &str) -> JSValueRef {
    let text = CString::new(message.replace('\0', " ")).unwrap_or_default();
    // SAFETY: per caller contract
    unsafe {
        let js_text = JSStringCreateWithUTF8CString(text.as_ptr());
        let value = JSValueMakeString(ctx, js_text);
        JSStringRelease(js_text);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> HostFn {
        Arc::new(|engine: &Engine, _: &[Value]| Ok(engine.null()))
    }

    #[test]
    fn test_register_and_lookup() {
        let table = DispatchTable::new();
        assert!(!table.register("print", stub()));
        assert!(table.lookup("print").is_some());
        assert!(table.lookup("println").is_none());
    }

    #[test]
    fn test_register_overwrites() {
        let table = DispatchTable::new();
        let first = stub();
        let second = stub();
        table.register("f", first.clone());
        assert!(table.register("f", second.clone()));
        assert_eq!(table.len(), 1);
        assert!(Arc::ptr_eq(&table.lookup("f").unwrap(), &second));
    }

    #[test]
    fn test_names_sorted() {
        let table = DispatchTable::new();
        table.register("zeta", stub());
        table.register("alpha", stub());
        assert_eq!(table.names(), vec!["alpha".to_string(), "zeta".to_string()]);
        table.clear();
        assert_eq!(table.len(), 0);
    }
}
