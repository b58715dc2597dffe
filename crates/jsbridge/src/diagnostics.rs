//! Diagnostics for engine-level failures.
//!
//! A [`Diagnostic`] is only built when a hook is installed; operations report
//! success or failure through their return value either way.

use std::sync::Arc;

use jsbridge_sys::*;

use crate::value::{property_number, property_string};

/// Callback receiving one [`Diagnostic`] per failed engine operation.
pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticFlags {
    /// Reported as a warning rather than an error. JavaScriptCore reports no
    /// warnings through its C API, so this is currently always false.
    pub warning: bool,
    /// The failure was a thrown exception rather than a compile error.
    pub exception: bool,
    /// The failing code ran in strict mode, when the engine reports it.
    pub strict: bool,
}

/// Error class of a diagnostic, derived from the thrown error's `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// A thrown non-Error value, or an error class not listed here
    Thrown = 0,
    Error = 1,
    SyntaxError = 2,
    TypeError = 3,
    ReferenceError = 4,
    RangeError = 5,
    EvalError = 6,
    UriError = 7,
    AggregateError = 8,
}

impl ErrorCode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Error" => Self::Error,
            "SyntaxError" => Self::SyntaxError,
            "TypeError" => Self::TypeError,
            "ReferenceError" => Self::ReferenceError,
            "RangeError" => Self::RangeError,
            "EvalError" => Self::EvalError,
            "URIError" => Self::UriError,
            "AggregateError" => Self::AggregateError,
            _ => Self::Thrown,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Human-readable message; never empty.
    pub message: String,
    pub filename: Option<String>,
    /// Text of the offending line, when the source is known.
    pub line_text: Option<String>,
    /// 1-based line number, 0 if unknown.
    pub line_number: u32,
    pub error_code: ErrorCode,
    /// 0-based column within `line_text`.
    pub column_offset: u32,
    pub flags: DiagnosticFlags,
}

/// Source text an operation ran, for recovering `line_text`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceInfo<'a> {
    text: &'a str,
    filename: &'a str,
    start_line: u32,
}

impl<'a> SourceInfo<'a> {
    pub(crate) fn new(text: &'a str, filename: &'a str, start_line: u32) -> Self {
        Self {
            text,
            filename,
            start_line,
        }
    }

    /// The text of absolute line `line_number`.
    pub(crate) fn line(&self, line_number: u32) -> Option<String> {
        let index = line_number.checked_sub(self.start_line.max(1))?;
        self.text
            .lines()
            .nth(index as usize)
            .map(|line| line.to_string())
    }
}

/// Build a diagnostic from a thrown value.
///
/// # Safety
/// Lock held; `exception` is a live value of `ctx`.
pub(crate) unsafe fn from_exception(
    ctx: JSContextRef,
    exception: JSValueRef,
    source: Option<SourceInfo<'_>>,
) -> Diagnostic {
    // SAFETY: per caller contract
    unsafe {
        let mut diagnostic = Diagnostic {
            message: String::new(),
            filename: source.map(|s| s.filename.to_string()),
            line_text: None,
            line_number: 0,
            error_code: ErrorCode::Thrown,
            column_offset: 0,
            flags: DiagnosticFlags {
                exception: true,
                ..Default::default()
            },
        };

        if JSValueIsObject(ctx, exception) {
            let error = exception as JSObjectRef;
            let name = property_string(ctx, error, "name");
            diagnostic.error_code = name
                .as_deref()
                .map(ErrorCode::from_name)
                .unwrap_or(ErrorCode::Thrown);
            diagnostic.message = property_string(ctx, error, "message")
                .filter(|m| !m.is_empty())
                .or(name)
                .unwrap_or_default();
            if let Some(url) = property_string(ctx, error, "sourceURL") {
                diagnostic.filename = Some(url);
            }
            diagnostic.line_number = property_number(ctx, error, "line")
                .map(|n| n as u32)
                .unwrap_or(0);
            diagnostic.column_offset = property_number(ctx, error, "column")
                .map(|n| (n as u32).saturating_sub(1))
                .unwrap_or(0);
        }

        if diagnostic.message.is_empty() {
            let mut inner: JSValueRef = std::ptr::null_mut();
            let text = JSValueToStringCopy(ctx, exception, &mut inner);
            if let Some(text) = crate::string::JsString::adopt(text) {
                diagnostic.message = text.to_rust();
            }
        }
        if diagnostic.message.is_empty() {
            diagnostic.message = "uncaught exception".to_string();
        }

        diagnostic.line_text = source.and_then(|s| s.line(diagnostic.line_number));
        diagnostic
    }
}

/// Build a diagnostic for source that failed to compile.
pub(crate) fn from_compile_error(message: String, line: u32, source: SourceInfo<'_>) -> Diagnostic {
    let message = if message.is_empty() {
        "syntax error".to_string()
    } else {
        message
    };
    Diagnostic {
        message,
        filename: Some(source.filename.to_string()),
        line_text: source.line(line),
        line_number: line,
        error_code: ErrorCode::SyntaxError,
        column_offset: 0,
        flags: DiagnosticFlags::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_name() {
        assert_eq!(ErrorCode::from_name("ReferenceError"), ErrorCode::ReferenceError);
        assert_eq!(ErrorCode::from_name("URIError"), ErrorCode::UriError);
        assert_eq!(ErrorCode::from_name("MyCustomError"), ErrorCode::Thrown);
        assert_eq!(ErrorCode::SyntaxError.as_u32(), 2);
    }

    #[test]
    fn test_source_line_lookup() {
        let source = SourceInfo::new("a\nb\nc", "x.js", 1);
        assert_eq!(source.line(1).as_deref(), Some("a"));
        assert_eq!(source.line(3).as_deref(), Some("c"));
        assert_eq!(source.line(4), None);
        assert_eq!(source.line(0), None);
    }

    #[test]
    fn test_source_line_lookup_with_offset() {
        let source = SourceInfo::new("first\nsecond", "x.js", 10);
        assert_eq!(source.line(10).as_deref(), Some("first"));
        assert_eq!(source.line(11).as_deref(), Some("second"));
        assert_eq!(source.line(9), None);
    }

    #[test]
    fn test_compile_error_diagnostic() {
        let source = SourceInfo::new("let x = 1;\nlet = ;", "bad.js", 1);
        let diagnostic = from_compile_error("Unexpected token '='".into(), 2, source);
        assert_eq!(diagnostic.error_code, ErrorCode::SyntaxError);
        assert_eq!(diagnostic.filename.as_deref(), Some("bad.js"));
        assert_eq!(diagnostic.line_text.as_deref(), Some("let = ;"));
        assert!(!diagnostic.flags.exception);
    }

    #[test]
    fn test_compile_error_never_empty() {
        let source = SourceInfo::new("", "empty.js", 1);
        let diagnostic = from_compile_error(String::new(), 0, source);
        assert_eq!(diagnostic.message, "syntax error");
    }
}
