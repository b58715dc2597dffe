//! `print` and `println` globals.
//!
//! Both are ordinary host functions registered through the dispatch table.
//! Output goes to a pluggable [`PrintSink`] so embedders can capture it.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use jsbridge::Engine;
//!
//! let captured = Arc::new(Mutex::new(String::new()));
//! let sink = captured.clone();
//! let engine = Engine::builder()
//!     .print_sink(move |text| sink.lock().unwrap().push_str(text))
//!     .build()
//!     .unwrap();
//! engine.evaluate("println('a', 1)").unwrap();
//! assert_eq!(*captured.lock().unwrap(), "a, 1\n");
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::BridgeResult;
use crate::value::Value;

/// Destination for text written by `print` and `println`.
pub type PrintSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Writes to the process's stdout, flushing after each call.
pub fn stdout_sink() -> PrintSink {
    Arc::new(|text| {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    })
}

pub(crate) fn install(engine: &Engine, sink: PrintSink) -> BridgeResult<()> {
    let print_sink = sink.clone();
    engine.register_function("print", move |engine, args| {
        print_sink(&format_print_args(args, false));
        Ok(engine.null())
    })?;

    engine.register_function("println", move |engine, args| {
        sink(&format_print_args(args, true));
        Ok(engine.null())
    })?;

    Ok(())
}

/// Stringify `args` the way script code would and join them with `", "`.
pub(crate) fn format_print_args(args: &[Value], newline: bool) -> String {
    let mut text = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if newline {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn capturing_engine() -> (Engine, Arc<Mutex<String>>) {
        let captured = Arc::new(Mutex::new(String::new()));
        let sink = captured.clone();
        let engine = Engine::builder()
            .print_sink(move |text| sink.lock().push_str(text))
            .build()
            .unwrap();
        (engine, captured)
    }

    #[test]
    fn test_format_print_args() {
        let engine = Engine::builder().console(false).build().unwrap();
        let args = vec![
            engine.string("x").unwrap(),
            engine.int(2),
            engine.boolean(true),
            engine.undefined(),
        ];
        assert_eq!(format_print_args(&args, false), "x, 2, true, undefined");
        assert_eq!(format_print_args(&[], true), "\n");
    }

    #[test]
    fn test_print_and_println() {
        let (engine, captured) = capturing_engine();
        engine.evaluate("print('a'); print('b', 3); println(); println(1.5)").unwrap();
        assert_eq!(*captured.lock(), "ab, 3\n1.5\n");
    }

    #[test]
    fn test_print_returns_null() {
        let (engine, _captured) = capturing_engine();
        assert!(engine.evaluate("print('x')").unwrap().is_null());
    }

    #[test]
    fn test_console_disabled() {
        let engine = Engine::builder().console(false).build().unwrap();
        assert!(engine.function_names().is_empty());
        assert!(engine.evaluate("typeof print").unwrap().string() == "undefined");
    }
}
