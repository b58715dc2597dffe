//! jsbridge - embed JavaScriptCore in a multi-threaded host.
//!
//! The engine is single-threaded and garbage collected; the host is neither.
//! This crate bridges the two:
//!
//! - **Reentrant execution lock**: one thread at a time inside an engine, and
//!   that thread may re-enter from host callbacks without deadlocking.
//! - **Rooted handles**: every [`Value`] keeps its engine value alive. Handles
//!   may be dropped on any thread; the release is queued and applied the next
//!   time the engine holds its lock.
//! - **Name-keyed dispatch**: every host function shares one native
//!   trampoline that looks the function up by name, so re-registering a name
//!   rebinds script code that already captured it.
//! - **Diagnostics hook**: structured reports of engine-level failures.
//!
//! # Example
//!
//! ```no_run
//! use jsbridge::{BridgeError, Engine};
//!
//! let engine = Engine::new(32 * 1024 * 1024).unwrap();
//! engine.set_diagnostic_hook(|d| eprintln!("line {}: {}", d.line_number, d.message));
//!
//! engine
//!     .register_function("greet", |engine, args| {
//!         let name = args.first().ok_or_else(|| BridgeError::host("greet(name)"))?;
//!         engine.string(&format!("hello, {}", name.to_string()))
//!     })
//!     .unwrap();
//!
//! let unit = engine.compile("greet('world')", "main.js", 1).unwrap();
//! assert_eq!(engine.execute(&unit).unwrap().string(), "hello, world");
//!
//! let add = engine.evaluate("(a, b) => a + b").unwrap();
//! let sum = engine.call(&add, &[engine.int(2), engine.int(3)]).unwrap();
//! assert_eq!(sum.int(), 5);
//!
//! engine.dispose();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Engine (Clone, Send + Sync)                          │
//! │  evaluate / compile / execute / call / register      │
//! └───────────────┬──────────────────────────────────────┘
//!                 │ Scope: lock + drain + ceiling check
//! ┌───────────────┴──────┬──────────────┬────────────────┐
//! │ ExecutionLock        │ RootTable    │ DispatchTable  │
//! │ (owner, depth)       │ + disposal   │ name → HostFn  │
//! │                      │   queue      │ + trampoline   │
//! └──────────────────────┴──────────────┴────────────────┘
//!                 │
//!          jsbridge-sys (JavaScriptCore C API)
//! ```

pub mod config;
pub mod console;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lock;
pub mod memory;
pub mod object;
pub mod roots;
pub mod script;
mod string;
pub mod value;

pub use config::{EngineBuilder, EngineConfig};
pub use console::PrintSink;
pub use diagnostics::{Diagnostic, DiagnosticFlags, DiagnosticHook, ErrorCode};
pub use dispatch::HostFn;
pub use engine::{Engine, EngineGuard, EngineStats, EngineStatsSnapshot};
pub use error::{BridgeError, BridgeResult, ConstructionError};
pub use lock::{ExecutionGuard, ExecutionLock, LockState};
pub use memory::HeapStats;
pub use object::Object;
pub use roots::RootId;
pub use script::CompiledUnit;
pub use value::{Tag, Value};
