//! Engine orchestration.
//!
//! An [`Engine`] owns one JavaScriptCore context group and global context and
//! composes the execution lock, the root table, and the dispatch table. Every
//! public operation runs inside a [`Scope`]: the scope acquires the lock,
//! drains queued disposals, and on the outermost release drains again and
//! applies the memory ceiling.
//!
//! # Example
//!
//! ```no_run
//! use jsbridge::Engine;
//!
//! let engine = Engine::new(32 * 1024 * 1024).unwrap();
//! engine
//!     .register_function("addOne", |engine, args| {
//!         let n = args.first().map(|v| v.to_number()).transpose()?.unwrap_or(0.0);
//!         Ok(engine.number(n + 1.0))
//!     })
//!     .unwrap();
//!
//! let result = engine.evaluate("addOne(41)").unwrap();
//! assert_eq!(result.to_number().unwrap(), 42.0);
//! engine.dispose();
//! ```

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use jsbridge_sys::*;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::config::{EngineBuilder, EngineConfig};
use crate::console;
use crate::diagnostics::{self, Diagnostic, DiagnosticHook, SourceInfo};
use crate::dispatch::{self, DispatchTable, HostFn};
use crate::error::{BridgeError, BridgeResult, ConstructionError};
use crate::lock::{ExecutionGuard, ExecutionLock, LockState};
use crate::memory::{self, HeapStats};
use crate::object::Object;
use crate::roots::{DisposalQueue, RootId, RootTable};
use crate::script::CompiledUnit;
use crate::string::JsString;
use crate::value::{Handle, Value};

/// JavaScriptCore's process-wide initialization is not reentrant, so engine
/// construction is serialized.
static CONSTRUCTION_LOCK: Mutex<()> = Mutex::new(());

/// Something registered in the engine's GC root set on the host's behalf.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Root {
    Value(JSValueRef),
    Script(JSScriptRef),
}

// SAFETY: roots are only dereferenced by the engine while the execution lock is held
unsafe impl Send for Root {}
unsafe impl Sync for Root {}

impl Root {
    /// # Safety
    /// `ctx` must be the context the root was registered in.
    unsafe fn unroot(self, ctx: JSContextRef) {
        // SAFETY: per caller contract; each root is unrooted once
        unsafe {
            match self {
                Root::Value(value) => JSValueUnprotect(ctx, value),
                Root::Script(script) => JSScriptRelease(script),
            }
        }
    }
}

struct NativeContext {
    group: JSContextGroupRef,
    ctx: JSGlobalContextRef,
    global: JSObjectRef,
}

// SAFETY: the engine API serializes itself internally and we only touch the
// context under the execution lock
unsafe impl Send for NativeContext {}
unsafe impl Sync for NativeContext {}

/// Counters for engine activity
///
/// All counters are atomic and can be read at any time without locking.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub evaluations: AtomicU64,
    pub executions: AtomicU64,
    pub calls: AtomicU64,
    pub callbacks: AtomicU64,
    pub failures: AtomicU64,
    pub roots_created: AtomicU64,
    pub roots_released: AtomicU64,
    pub collections: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
            callbacks: self.callbacks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            roots_created: self.roots_created.load(Ordering::Relaxed),
            roots_released: self.roots_released.load(Ordering::Relaxed),
            collections: self.collections.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub evaluations: u64,
    pub executions: u64,
    pub calls: u64,
    pub callbacks: u64,
    pub failures: u64,
    pub roots_created: u64,
    pub roots_released: u64,
    pub collections: u64,
}

impl EngineStatsSnapshot {
    /// Evaluate, execute and call operations issued by the host.
    pub fn operations(&self) -> u64 {
        self.evaluations + self.executions + self.calls
    }

    /// Roots created but not yet released.
    pub fn outstanding_roots(&self) -> u64 {
        self.roots_created.saturating_sub(self.roots_released)
    }
}

pub(crate) struct EngineInner {
    lock: ExecutionLock,
    native: NativeContext,
    disposed: AtomicBool,
    roots: RootTable<Root>,
    disposal: DisposalQueue,
    dispatch: DispatchTable,
    hook: RwLock<Option<DiagnosticHook>>,
    memory_ceiling: usize,
    memory_check_interval: u32,
    releases_since_check: AtomicU32,
    eval_filename: String,
    stats: EngineStats,
}

impl EngineInner {
    /// Enter the engine: lock, verify it is alive, drain pending disposals.
    ///
    /// # Panics
    /// If the engine has been disposed.
    pub(crate) fn enter(self: &Arc<Self>) -> Scope<'_> {
        let guard = self.lock.lock();
        if self.disposed.load(Ordering::Acquire) {
            drop(guard);
            panic!("engine used after dispose");
        }
        let drained = self.drain_disposals();
        Scope {
            inner: self,
            guard,
            drained,
        }
    }

    pub(crate) fn enqueue_disposal(&self, id: RootId) {
        self.disposal.enqueue(id);
    }

    pub(crate) fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub(crate) fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    fn drain_disposals(&self) -> usize {
        let ctx = self.native.ctx;
        let mut released = 0;
        for id in self.disposal.drain() {
            if let Some(root) = self.roots.release(id) {
                // SAFETY: lock held; the root came from this context
                unsafe { root.unroot(ctx) };
                released += 1;
            }
        }

        if released > 0 {
            self.stats
                .roots_released
                .fetch_add(released as u64, Ordering::Relaxed);
            trace!(released, live = self.roots.len(), "drained disposal queue");
        }
        released
    }

    fn enforce_memory_ceiling(&self) {
        if self.memory_ceiling == 0 {
            return;
        }

        let releases = self.releases_since_check.fetch_add(1, Ordering::Relaxed) + 1;
        if releases < self.memory_check_interval {
            return;
        }
        self.releases_since_check.store(0, Ordering::Relaxed);

        // SAFETY: lock held by the caller
        let Some(heap) = (unsafe { memory::read_heap_stats(self.native.ctx) }) else {
            return;
        };
        if memory::exceeds_ceiling(&heap, self.memory_ceiling) {
            warn!(
                heap_size = heap.heap_size,
                ceiling = self.memory_ceiling,
                "heap above memory ceiling, collecting"
            );
            // SAFETY: lock held by the caller
            unsafe { JSGarbageCollect(self.native.ctx) };
            self.stats.collections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Free every native resource. Idempotent.
    ///
    /// Callers hold the lock or have exclusive access.
    fn teardown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let ctx = self.native.ctx;
        let outstanding = self.roots.take_all();
        let abandoned = outstanding.len();
        for root in outstanding {
            // SAFETY: context still alive, each root unrooted once
            unsafe { root.unroot(ctx) };
        }
        let stale = self.disposal.drain().count();

        self.dispatch.clear();
        self.hook.write().take();

        // SAFETY: nothing references the context after this point
        unsafe {
            JSGlobalContextRelease(self.native.ctx);
            JSContextGroupRelease(self.native.group);
        }

        debug!(abandoned, stale, "engine disposed");
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Proof that the current thread holds the execution lock on a live engine.
pub(crate) struct Scope<'a> {
    inner: &'a Arc<EngineInner>,
    guard: ExecutionGuard<'a>,
    drained: usize,
}

impl<'a> Scope<'a> {
    pub(crate) fn ctx(&self) -> JSContextRef {
        self.inner.native.ctx
    }

    pub(crate) fn global(&self) -> JSObjectRef {
        self.inner.native.global
    }

    pub(crate) fn group(&self) -> JSContextGroupRef {
        self.inner.native.group
    }

    pub(crate) fn inner(&self) -> &'a Arc<EngineInner> {
        self.inner
    }

    pub(crate) fn engine(&self) -> Engine {
        Engine {
            inner: self.inner.clone(),
        }
    }

    pub(crate) fn is_outermost(&self) -> bool {
        self.guard.is_outermost()
    }

    /// Root `raw` and hand it to the host as a [`Value`].
    ///
    /// A null reference is surfaced as `undefined`.
    pub(crate) fn wrap(&self, raw: JSValueRef) -> Value {
        let ctx = self.ctx();
        // SAFETY: lock held; raw belongs to this context
        unsafe {
            let raw = if raw.is_null() {
                JSValueMakeUndefined(ctx)
            } else {
                raw
            };
            JSValueProtect(ctx, raw);
            let id = self.inner.roots.hold(Root::Value(raw));
            self.inner
                .stats
                .roots_created
                .fetch_add(1, Ordering::Relaxed);
            Value::from_raw(ctx, raw, Handle::new(id, self.inner.clone()))
        }
    }

    /// Take ownership of a freshly created script, already retained once.
    pub(crate) fn adopt_script(&self, script: JSScriptRef) -> Handle {
        let id = self.inner.roots.hold(Root::Script(script));
        self.inner
            .stats
            .roots_created
            .fetch_add(1, Ordering::Relaxed);
        Handle::new(id, self.inner.clone())
    }

    pub(crate) fn hook_installed(&self) -> bool {
        self.inner.hook.read().is_some()
    }

    /// Record a failed engine operation and report the thrown value.
    pub(crate) fn report_exception(&self, exception: JSValueRef, source: Option<SourceInfo<'_>>) {
        self.inner.stats.failures.fetch_add(1, Ordering::Relaxed);
        if exception.is_null() || !self.hook_installed() {
            return;
        }
        // SAFETY: lock held; exception is live on the engine stack
        let diagnostic = unsafe { diagnostics::from_exception(self.ctx(), exception, source) };
        self.emit(&diagnostic);
    }

    /// Record a failure whose diagnostic is built lazily.
    pub(crate) fn report_with(&self, build: impl FnOnce() -> Diagnostic) {
        self.inner.stats.failures.fetch_add(1, Ordering::Relaxed);
        if self.hook_installed() {
            self.emit(&build());
        }
    }

    fn emit(&self, diagnostic: &Diagnostic) {
        // Clone out so the hook may replace itself.
        let hook = self.inner.hook.read().clone();
        if let Some(hook) = hook {
            hook(diagnostic);
        }
    }

    pub(crate) fn check_owner(&self, handle: &Handle) {
        assert!(
            Arc::ptr_eq(self.inner, handle.engine()),
            "value belongs to a different engine"
        );
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if self.guard.is_outermost() && !self.inner.disposed.load(Ordering::Acquire) {
            self.inner.drain_disposals();
            self.inner.enforce_memory_ceiling();
        }
    }
}

/// A batch of engine operations under one lock acquisition.
///
/// Returned by [`Engine::lock`]. While it is alive other threads block on any
/// operation on this engine; the owning thread may keep calling in.
#[must_use = "the engine is unlocked as soon as the guard is dropped"]
pub struct EngineGuard<'a> {
    scope: Scope<'a>,
}

impl EngineGuard<'_> {
    pub fn depth(&self) -> usize {
        self.scope.guard.depth()
    }
}

/// An embedded JavaScriptCore instance.
///
/// Cheap to clone: clones share the same engine. `Engine` is `Send + Sync`;
/// calls from different threads are serialized, and a host function may call
/// back into the engine on the thread it was invoked on.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine that runs the collector once its heap exceeds
    /// `memory_ceiling` bytes. `0` disables the ceiling.
    pub fn new(memory_ceiling: usize) -> Result<Self, ConstructionError> {
        Self::builder().memory_ceiling(memory_ceiling).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn with_config(config: EngineConfig) -> Result<Self, ConstructionError> {
        let native = {
            let _guard = CONSTRUCTION_LOCK.lock();
            // SAFETY: plain allocation calls; every failure path releases what was created
            unsafe {
                let group = JSContextGroupCreate();
                if group.is_null() {
                    return Err(ConstructionError::RuntimeAllocation);
                }

                let ctx = JSGlobalContextCreateInGroup(group, ptr::null_mut());
                if ctx.is_null() {
                    JSContextGroupRelease(group);
                    return Err(ConstructionError::ContextAllocation);
                }

                let global = JSContextGetGlobalObject(ctx);
                if global.is_null() {
                    JSGlobalContextRelease(ctx);
                    JSContextGroupRelease(group);
                    return Err(ConstructionError::ContextAllocation);
                }

                NativeContext { group, ctx, global }
            }
        };

        let engine = Self {
            inner: Arc::new(EngineInner {
                lock: ExecutionLock::new(),
                native,
                disposed: AtomicBool::new(false),
                roots: RootTable::new(),
                disposal: DisposalQueue::new(),
                dispatch: DispatchTable::new(),
                hook: RwLock::new(config.diagnostic_hook),
                memory_ceiling: config.memory_ceiling,
                memory_check_interval: config.memory_check_interval.max(1),
                releases_since_check: AtomicU32::new(0),
                eval_filename: config.eval_filename,
                stats: EngineStats::default(),
            }),
        };

        if config.console {
            // Dropping `engine` on failure tears the context down.
            console::install(&engine, config.print_sink)
                .map_err(|e| ConstructionError::StandardLibraryInit(e.to_string()))?;
        }

        debug!(
            memory_ceiling = config.memory_ceiling,
            console = config.console,
            "engine created"
        );
        Ok(engine)
    }

    /// Compile and run `source` against the global object.
    pub fn evaluate(&self, source: &str) -> BridgeResult<Value> {
        let scope = self.inner.enter();
        self.inner.stats.evaluations.fetch_add(1, Ordering::Relaxed);

        let script = JsString::new(source)?;
        let url = JsString::new(&self.inner.eval_filename)?;
        let mut exception: JSValueRef = ptr::null_mut();

        // SAFETY: lock held; strings live across the call
        let result = unsafe {
            JSEvaluateScript(
                scope.ctx(),
                script.raw(),
                ptr::null_mut(),
                url.raw(),
                1,
                &mut exception,
            )
        };

        if !exception.is_null() || result.is_null() {
            scope.report_exception(
                exception,
                Some(SourceInfo::new(source, &self.inner.eval_filename, 1)),
            );
            return Err(BridgeError::Evaluation);
        }

        Ok(scope.wrap(result))
    }

    /// Parse `source` into a reusable unit without running it.
    ///
    /// `start_line` is the line number of the first line of `source` as
    /// reported in diagnostics and stack traces.
    pub fn compile(
        &self,
        source: &str,
        filename: &str,
        start_line: u32,
    ) -> BridgeResult<CompiledUnit> {
        let scope = self.inner.enter();

        let text = JsString::new(source)?;
        let url = JsString::new(filename)?;
        let mut error_message: JSStringRef = ptr::null_mut();
        let mut error_line: i32 = 0;

        // SAFETY: lock held; strings live across the call
        let script = unsafe {
            JSScriptCreateFromString(
                scope.group(),
                url.raw(),
                start_line.min(i32::MAX as u32) as i32,
                text.raw(),
                &mut error_message,
                &mut error_line,
            )
        };
        // SAFETY: error_message is null or owned by us
        let error_message = unsafe { JsString::adopt(error_message) };

        if script.is_null() {
            scope.report_with(|| {
                let message = error_message
                    .map(|m| m.to_rust())
                    .unwrap_or_else(|| "syntax error".to_string());
                diagnostics::from_compile_error(
                    message,
                    error_line.max(0) as u32,
                    SourceInfo::new(source, filename, start_line),
                )
            });
            return Err(BridgeError::Compilation);
        }

        let handle = scope.adopt_script(script);
        trace!(filename, "compiled script");
        Ok(CompiledUnit::new(script, source, filename, start_line, handle))
    }

    /// Run a unit produced by [`compile`](Self::compile).
    pub fn execute(&self, unit: &CompiledUnit) -> BridgeResult<Value> {
        let scope = self.inner.enter();
        scope.check_owner(unit.handle());
        self.inner.stats.executions.fetch_add(1, Ordering::Relaxed);

        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; the script is rooted by `unit`
        let result = unsafe {
            JSScriptEvaluate(scope.ctx(), unit.raw(), ptr::null_mut(), &mut exception)
        };

        if !exception.is_null() || result.is_null() {
            scope.report_exception(exception, Some(unit.source_info()));
            return Err(BridgeError::Execution);
        }

        Ok(scope.wrap(result))
    }

    /// Invoke a script function with host arguments. `this` is undefined.
    pub fn call(&self, function: &Value, args: &[Value]) -> BridgeResult<Value> {
        let scope = self.inner.enter();
        scope.check_owner(function.handle());
        self.inner.stats.calls.fetch_add(1, Ordering::Relaxed);

        if !function.is_function() {
            return Err(BridgeError::NotAFunction(function.tag()));
        }

        let raw_args: Vec<JSValueRef> = args
            .iter()
            .map(|arg| {
                scope.check_owner(arg.handle());
                arg.raw()
            })
            .collect();
        let mut exception: JSValueRef = ptr::null_mut();

        // SAFETY: lock held; callee and arguments are rooted by the caller's handles
        let result = unsafe {
            JSObjectCallAsFunction(
                scope.ctx(),
                function.raw() as JSObjectRef,
                ptr::null_mut(),
                raw_args.len(),
                raw_args.as_ptr(),
                &mut exception,
            )
        };

        if !exception.is_null() || result.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Call);
        }

        Ok(scope.wrap(result))
    }

    /// Expose `function` to scripts as a global named `name`.
    ///
    /// Registering a name again replaces the host function; script code that
    /// captured the old binding reaches the new function, because dispatch
    /// looks the name up on every call.
    ///
    /// The engine owns its host functions. A function that captures an
    /// [`Engine`] clone or a [`Value`] keeps the engine alive through that
    /// capture, so dropping every outside reference will not dispose it;
    /// call [`dispose`](Self::dispose) explicitly, which drops the registered
    /// functions along with their captures.
    pub fn register_function<F>(&self, name: &str, function: F) -> BridgeResult<()>
    where
        F: Fn(&Engine, &[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        self.register_host_fn(name, Arc::new(function))
    }

    pub(crate) fn register_host_fn(&self, name: &str, function: HostFn) -> BridgeResult<()> {
        let scope = self.inner.enter();
        // SAFETY: lock held
        unsafe { dispatch::bind(&scope, name)? };
        let replaced = self.inner.dispatch.register(name, function);
        debug!(name, replaced, "registered host function");
        Ok(())
    }

    /// Install a hook that receives a [`Diagnostic`] for every engine-level
    /// failure. Replaces any previous hook.
    pub fn set_diagnostic_hook<F>(&self, hook: F)
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        *self.inner.hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_diagnostic_hook(&self) {
        self.inner.hook.write().take();
    }

    pub fn null(&self) -> Value {
        let scope = self.inner.enter();
        // SAFETY: lock held
        scope.wrap(unsafe { JSValueMakeNull(scope.ctx()) })
    }

    pub fn undefined(&self) -> Value {
        let scope = self.inner.enter();
        // SAFETY: lock held
        scope.wrap(unsafe { JSValueMakeUndefined(scope.ctx()) })
    }

    pub fn int(&self, n: i32) -> Value {
        self.number(f64::from(n))
    }

    pub fn number(&self, n: f64) -> Value {
        let scope = self.inner.enter();
        // SAFETY: lock held
        scope.wrap(unsafe { JSValueMakeNumber(scope.ctx(), n) })
    }

    pub fn boolean(&self, b: bool) -> Value {
        let scope = self.inner.enter();
        // SAFETY: lock held
        scope.wrap(unsafe { JSValueMakeBoolean(scope.ctx(), b) })
    }

    pub fn string(&self, s: &str) -> BridgeResult<Value> {
        let scope = self.inner.enter();
        let text = JsString::new(s)?;
        // SAFETY: lock held; the engine copies the string
        Ok(scope.wrap(unsafe { JSValueMakeString(scope.ctx(), text.raw()) }))
    }

    /// A fresh empty plain object.
    pub fn new_object(&self) -> Object {
        let scope = self.inner.enter();
        // SAFETY: lock held
        let raw = unsafe { JSObjectMake(scope.ctx(), ptr::null_mut(), ptr::null_mut()) };
        Object::from_value(scope.wrap(raw))
    }

    /// A fresh empty array.
    pub fn new_array(&self) -> BridgeResult<Object> {
        let scope = self.inner.enter();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held
        let raw = unsafe { JSObjectMakeArray(scope.ctx(), 0, ptr::null(), &mut exception) };
        if !exception.is_null() || raw.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property("Array".to_string()));
        }
        Ok(Object::from_value(scope.wrap(raw)))
    }

    /// The global object.
    pub fn global(&self) -> Object {
        let scope = self.inner.enter();
        Object::from_value(scope.wrap(scope.global()))
    }

    /// Build an engine value from JSON data.
    pub fn value_from_json(&self, json: &serde_json::Value) -> BridgeResult<Value> {
        let text = serde_json::to_string(json)?;
        let scope = self.inner.enter();
        let js_text = JsString::new(&text)?;
        // SAFETY: lock held
        let raw = unsafe { JSValueMakeFromJSONString(scope.ctx(), js_text.raw()) };
        if raw.is_null() {
            return Err(BridgeError::Property("JSON.parse".to_string()));
        }
        Ok(scope.wrap(raw))
    }

    /// Hold the execution lock across several operations.
    pub fn lock(&self) -> EngineGuard<'_> {
        EngineGuard {
            scope: self.inner.enter(),
        }
    }

    /// Release every root whose handle has been dropped. Returns how many.
    pub fn flush(&self) -> usize {
        let scope = self.inner.enter();
        let released = scope.drained + self.inner.drain_disposals();
        trace!(released, "flush");
        released
    }

    /// Number of live root registrations after draining the disposal queue.
    pub fn root_count(&self) -> usize {
        let _scope = self.inner.enter();
        self.inner.roots.len()
    }

    /// Disposals queued but not yet drained.
    pub fn pending_disposals(&self) -> usize {
        self.inner.disposal.pending()
    }

    pub fn lock_state(&self) -> LockState {
        self.inner.lock.state()
    }

    /// Heap statistics reported by the engine.
    pub fn heap_stats(&self) -> Option<HeapStats> {
        let scope = self.inner.enter();
        // SAFETY: lock held
        unsafe { memory::read_heap_stats(scope.ctx()) }
    }

    /// Run the collector now.
    pub fn collect_garbage(&self) {
        let scope = self.inner.enter();
        // SAFETY: lock held
        unsafe { JSGarbageCollect(scope.ctx()) };
        self.inner.stats.collections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Names of the registered host functions, sorted.
    pub fn function_names(&self) -> Vec<String> {
        self.inner.dispatch.names()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Free the native context. Terminal.
    ///
    /// Outstanding handles stay safe to drop, but any other use of them or of
    /// this engine afterwards panics.
    ///
    /// # Panics
    /// If the engine is already disposed, or when called from inside a host
    /// function while a script is running.
    pub fn dispose(&self) {
        let scope = self.inner.enter();
        if !scope.is_outermost() {
            drop(scope);
            panic!("dispose called while an engine operation is in progress on this thread");
        }
        self.inner.teardown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("disposed", &self.is_disposed())
            .field("roots", &self.inner.roots.len())
            .field("functions", &self.inner.dispatch.len())
            .field("lock", &self.inner.lock.state())
            .finish()
    }
}

impl PartialEq for Engine {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Engine {}
