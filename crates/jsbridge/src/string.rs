//! Owned engine strings

use std::ffi::{CString, c_char};

use jsbridge_sys::*;

use crate::error::{BridgeError, BridgeResult};

/// An engine string released on drop.
pub(crate) struct JsString {
    raw: JSStringRef,
}

impl JsString {
    pub(crate) fn new(text: &str) -> BridgeResult<Self> {
        let c_text = CString::new(text)?;
        // SAFETY: c_text is a valid NUL-terminated UTF-8 buffer
        let raw = unsafe { JSStringCreateWithUTF8CString(c_text.as_ptr()) };
        // SAFETY: a non-null result is a string we own one reference to
        unsafe { Self::adopt(raw) }.ok_or(BridgeError::StringAllocation)
    }

    /// Take ownership of a string returned by a `*Copy`/`Create` call.
    ///
    /// # Safety
    /// `raw` must be null or a string the caller owns one reference to.
    pub(crate) unsafe fn adopt(raw: JSStringRef) -> Option<Self> {
        (!raw.is_null()).then_some(Self { raw })
    }

    pub(crate) fn raw(&self) -> JSStringRef {
        self.raw
    }

    pub(crate) fn to_rust(&self) -> String {
        // SAFETY: self.raw is a live string
        unsafe { js_string_to_rust(self.raw) }
    }
}

impl Drop for JsString {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference
        unsafe { JSStringRelease(self.raw) };
    }
}

/// Copy an engine string into a Rust `String`.
///
/// # Safety
/// `js_str` must be null or a live engine string.
pub(crate) unsafe fn js_string_to_rust(js_str: JSStringRef) -> String {
    if js_str.is_null() {
        return String::new();
    }

    // SAFETY: js_str is live per caller contract
    unsafe {
        let capacity = JSStringGetMaximumUTF8CStringSize(js_str);
        let mut buffer = vec![0u8; capacity];
        let written = JSStringGetUTF8CString(js_str, buffer.as_mut_ptr() as *mut c_char, capacity);
        // `written` counts the trailing NUL
        buffer.truncate(written.saturating_sub(1));
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
