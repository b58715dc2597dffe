//! Engine configuration.
//!
//! ```no_run
//! use jsbridge::Engine;
//!
//! let engine = Engine::builder()
//!     .memory_ceiling(64 * 1024 * 1024)
//!     .eval_filename("repl")
//!     .on_diagnostic(|d| {
//!         let file = d.filename.as_deref().unwrap_or("?");
//!         eprintln!("{}:{}: {}", file, d.line_number, d.message)
//!     })
//!     .build()
//!     .unwrap();
//! # drop(engine);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::console::{self, PrintSink};
use crate::diagnostics::{Diagnostic, DiagnosticHook};
use crate::engine::Engine;
use crate::error::ConstructionError;

/// Default memory ceiling: 32 MiB.
pub const DEFAULT_MEMORY_CEILING: usize = 32 * 1024 * 1024;

/// Default number of outermost operations between heap checks.
pub const DEFAULT_MEMORY_CHECK_INTERVAL: u32 = 64;

#[derive(Clone)]
pub struct EngineConfig {
    /// Heap size in bytes above which a collection is forced. 0 = unlimited.
    pub memory_ceiling: usize,

    /// Check the heap on every n-th outermost operation.
    pub memory_check_interval: u32,

    /// Install the `print` and `println` globals.
    pub console: bool,

    /// Filename reported for [`Engine::evaluate`] sources.
    pub eval_filename: String,

    pub diagnostic_hook: Option<DiagnosticHook>,

    /// Where `print` and `println` write.
    pub print_sink: PrintSink,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_ceiling: DEFAULT_MEMORY_CEILING,
            memory_check_interval: DEFAULT_MEMORY_CHECK_INTERVAL,
            console: true,
            eval_filename: "<eval>".to_string(),
            diagnostic_hook: None,
            print_sink: console::stdout_sink(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("memory_ceiling", &self.memory_ceiling)
            .field("memory_check_interval", &self.memory_check_interval)
            .field("console", &self.console)
            .field("eval_filename", &self.eval_filename)
            .field("diagnostic_hook", &self.diagnostic_hook.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`]s.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn memory_ceiling(mut self, bytes: usize) -> Self {
        self.config.memory_ceiling = bytes;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn memory_check_interval(mut self, operations: u32) -> Self {
        self.config.memory_check_interval = operations.max(1);
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.config.console = enabled;
        self
    }

    pub fn eval_filename(mut self, filename: impl Into<String>) -> Self {
        self.config.eval_filename = filename.into();
        self
    }

    pub fn on_diagnostic<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        self.config.diagnostic_hook = Some(Arc::new(hook));
        self
    }

    pub fn print_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.print_sink = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build(self) -> Result<Engine, ConstructionError> {
        Engine::with_config(self.config)
    }
}
