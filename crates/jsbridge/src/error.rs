//! Error types for the embedding bridge.
//!
//! Construction failures and per-call failures are separate types: an engine
//! that failed to build never exists, while a failed call leaves the engine
//! usable. Per-call errors only name what went wrong; message, location and
//! source line for engine-level failures travel through the diagnostic hook.

use std::ffi::NulError;

use thiserror::Error;

use crate::value::Tag;

/// Result type alias for engine operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Why [`Engine`](crate::Engine) construction failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// The engine runtime (context group) could not be allocated.
    #[error("failed to allocate engine runtime")]
    RuntimeAllocation,

    /// The execution context or its global object could not be allocated.
    #[error("failed to allocate engine context")]
    ContextAllocation,

    /// Installing the bridge's builtins on the global object failed.
    #[error("failed to initialize standard library: {0}")]
    StandardLibraryInit(String),
}

/// A per-call failure. The engine remains usable after any of these.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// One-shot evaluation threw or failed to parse
    #[error("script evaluation failed")]
    Evaluation,

    /// Source text did not compile
    #[error("script compilation failed")]
    Compilation,

    /// A compiled unit threw while running
    #[error("compiled script execution failed")]
    Execution,

    /// A script function threw when called from the host
    #[error("function call failed")]
    Call,

    /// The callee is not a function
    #[error("value of type {0} is not callable")]
    NotAFunction(Tag),

    /// Engine coercion failed
    #[error("cannot convert {tag} value to {target}")]
    Conversion { target: &'static str, tag: Tag },

    /// Property or element access threw
    #[error("property access failed: {0}")]
    Property(String),

    /// A host function reported failure
    #[error("{0}")]
    Host(String),

    /// The trampoline was reached for a name with no registered host function
    #[error("no host function registered as '{0}'")]
    UnknownFunction(String),

    /// Host text cannot cross into the engine (interior NUL byte)
    #[error("string contains an interior NUL byte at position {0}")]
    InvalidString(usize),

    /// The engine could not allocate a string
    #[error("failed to allocate engine string")]
    StringAllocation,

    /// JSON marshaling failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Failure raised from inside a host function.
    ///
    /// The message becomes the thrown value seen by script code.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    pub(crate) fn conversion(target: &'static str, tag: Tag) -> Self {
        Self::Conversion { target, tag }
    }
}

impl From<NulError> for BridgeError {
    fn from(e: NulError) -> Self {
        Self::InvalidString(e.nul_position())
    }
}
