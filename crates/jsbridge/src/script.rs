//! Compiled script units.
//!
//! A unit is rooted from the moment it is compiled, through the same root
//! table and disposal queue as value handles, so it cannot be collected
//! between [`Engine::compile`](crate::Engine::compile) and a later execute.

use std::fmt;
use std::sync::Arc;

use jsbridge_sys::JSScriptRef;

use crate::diagnostics::SourceInfo;
use crate::error::BridgeResult;
use crate::value::{Handle, Value};

/// Parsed, reusable script.
pub struct CompiledUnit {
    raw: JSScriptRef,
    source: Arc<str>,
    filename: Arc<str>,
    start_line: u32,
    handle: Handle,
}

// SAFETY: the script is only used by the engine under the execution lock
unsafe impl Send for CompiledUnit {}
unsafe impl Sync for CompiledUnit {}

impl CompiledUnit {
    pub(crate) fn new(
        raw: JSScriptRef,
        source: &str,
        filename: &str,
        start_line: u32,
        handle: Handle,
    ) -> Self {
        Self {
            raw,
            source: source.into(),
            filename: filename.into(),
            start_line,
            handle,
        }
    }

    pub(crate) fn raw(&self) -> JSScriptRef {
        self.raw
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn source_info(&self) -> SourceInfo<'_> {
        SourceInfo::new(&self.source, &self.filename, self.start_line)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Run the unit. See [`Engine::execute`](crate::Engine::execute).
    pub fn execute(&self) -> BridgeResult<Value> {
        crate::Engine {
            inner: self.handle.engine().clone(),
        }
        .execute(self)
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("filename", &self.filename)
            .field("start_line", &self.start_line)
            .field("root", &self.handle.id())
            .finish()
    }
}
