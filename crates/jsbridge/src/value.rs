//! Rooted value handles.
//!
//! A [`Value`] owns exactly one root registration. Creating one protects the
//! engine value; dropping it queues the unprotect, which the engine performs
//! the next time it holds the execution lock. Cloning registers a second root,
//! so root count always equals the number of live handles.

use std::ffi::CString;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use jsbridge_sys::*;
use serde::de::DeserializeOwned;

use crate::engine::{Engine, EngineInner};
use crate::error::{BridgeError, BridgeResult};
use crate::object::Object;
use crate::roots::RootId;
use crate::string::JsString;

/// Ownership of one root registration.
pub(crate) struct Handle {
    id: RootId,
    engine: Arc<EngineInner>,
}

impl Handle {
    pub(crate) fn new(id: RootId, engine: Arc<EngineInner>) -> Self {
        Self { id, engine }
    }

    pub(crate) fn id(&self) -> RootId {
        self.id
    }

    pub(crate) fn engine(&self) -> &Arc<EngineInner> {
        &self.engine
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.engine.enqueue_disposal(self.id);
    }
}

/// Engine type of a [`Value`], fixed when the handle is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Null,
    /// `undefined`, the void value
    Undefined,
    /// A number that is integral, fits in `i32`, and is not `-0`
    Int,
    Number,
    Boolean,
    String,
    Object,
    Function,
    /// Engine primitives with no tag of their own (symbol, bigint)
    Other,
}

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "null",
            Tag::Undefined => "undefined",
            Tag::Int => "int",
            Tag::Number => "number",
            Tag::Boolean => "boolean",
            Tag::String => "string",
            Tag::Object => "object",
            Tag::Function => "function",
            Tag::Other => "other",
        }
    }

    /// # Safety
    /// `raw` must be a live value of `ctx`, accessed under the execution lock.
    pub(crate) unsafe fn classify(ctx: JSContextRef, raw: JSValueRef) -> Tag {
        // SAFETY: per caller contract
        unsafe {
            match JSValueGetType(ctx, raw) {
                K_JS_TYPE_UNDEFINED => Tag::Undefined,
                K_JS_TYPE_NULL => Tag::Null,
                K_JS_TYPE_BOOLEAN => Tag::Boolean,
                K_JS_TYPE_NUMBER => {
                    if fits_int32(JSValueToNumber(ctx, raw, ptr::null_mut())) {
                        Tag::Int
                    } else {
                        Tag::Number
                    }
                }
                K_JS_TYPE_STRING => Tag::String,
                K_JS_TYPE_OBJECT if JSObjectIsFunction(ctx, raw as JSObjectRef) => Tag::Function,
                K_JS_TYPE_OBJECT => Tag::Object,
                _ => Tag::Other,
            }
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn fits_int32(n: f64) -> bool {
    n.fract() == 0.0
        && n >= f64::from(i32::MIN)
        && n <= f64::from(i32::MAX)
        && !(n == 0.0 && n.is_sign_negative())
}

/// Round to nearest, halves toward +infinity. `None` for NaN and for numbers
/// outside the open interval (-2^31 - 1, 2^31).
pub(crate) fn to_int32(n: f64) -> Option<i32> {
    if n.is_nan() || n <= -2_147_483_649.0 || n >= 2_147_483_648.0 {
        return None;
    }
    // 2^31 - 0.5 rounds up past i32::MAX; `as` saturates
    Some((n + 0.5).floor() as i32)
}

/// A rooted handle to an engine value.
pub struct Value {
    raw: JSValueRef,
    tag: Tag,
    handle: Handle,
}

// SAFETY: the raw reference is only dereferenced under the execution lock,
// and dropping only enqueues on a channel
unsafe impl Send for Value {}
unsafe impl Sync for Value {}

impl Value {
    /// # Safety
    /// `raw` is live in `ctx`, already rooted under `handle`, lock held.
    pub(crate) unsafe fn from_raw(ctx: JSContextRef, raw: JSValueRef, handle: Handle) -> Self {
        // SAFETY: per caller contract
        let tag = unsafe { Tag::classify(ctx, raw) };
        Self { raw, tag, handle }
    }

    pub(crate) fn raw(&self) -> JSValueRef {
        self.raw
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The engine this value lives in.
    pub fn engine(&self) -> Engine {
        Engine {
            inner: self.handle.engine.clone(),
        }
    }

    /// Identifier of this handle's root registration.
    pub fn root_id(&self) -> RootId {
        self.handle.id
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_null(&self) -> bool {
        self.tag == Tag::Null
    }

    pub fn is_undefined(&self) -> bool {
        self.tag == Tag::Undefined
    }

    pub fn is_int(&self) -> bool {
        self.tag == Tag::Int
    }

    /// True for every number, integral or not.
    pub fn is_number(&self) -> bool {
        matches!(self.tag, Tag::Int | Tag::Number)
    }

    pub fn is_boolean(&self) -> bool {
        self.tag == Tag::Boolean
    }

    pub fn is_string(&self) -> bool {
        self.tag == Tag::String
    }

    /// True for objects, including functions and arrays.
    pub fn is_object(&self) -> bool {
        matches!(self.tag, Tag::Object | Tag::Function)
    }

    pub fn is_function(&self) -> bool {
        self.tag == Tag::Function
    }

    /// The script-level `typeof` of this value.
    pub fn type_name(&self) -> &'static str {
        match self.tag {
            Tag::Null | Tag::Object => "object",
            Tag::Undefined => "undefined",
            Tag::Int | Tag::Number => "number",
            Tag::Boolean => "boolean",
            Tag::String => "string",
            Tag::Function => "function",
            Tag::Other => {
                let scope = self.handle.engine.enter();
                // SAFETY: lock held
                match unsafe { JSValueGetType(scope.ctx(), self.raw) } {
                    K_JS_TYPE_SYMBOL => "symbol",
                    K_JS_TYPE_BIGINT => "bigint",
                    _ => "unknown",
                }
            }
        }
    }

    fn mismatch(&self, expected: &str) -> ! {
        panic!("expected {expected} value, found {}", self.tag)
    }

    fn primitive_number(&self) -> f64 {
        let scope = self.handle.engine.enter();
        // SAFETY: lock held; only called on number tags, which cannot throw
        unsafe { JSValueToNumber(scope.ctx(), self.raw, ptr::null_mut()) }
    }

    /// # Panics
    /// If the tag is not [`Tag::Int`]. See [`try_int`](Self::try_int).
    pub fn int(&self) -> i32 {
        self.try_int().unwrap_or_else(|| self.mismatch("int"))
    }

    pub fn try_int(&self) -> Option<i32> {
        (self.tag == Tag::Int).then(|| self.primitive_number() as i32)
    }

    /// # Panics
    /// If the value is not a number. See [`try_number`](Self::try_number).
    pub fn number(&self) -> f64 {
        self.try_number().unwrap_or_else(|| self.mismatch("number"))
    }

    pub fn try_number(&self) -> Option<f64> {
        self.is_number().then(|| self.primitive_number())
    }

    /// # Panics
    /// If the tag is not [`Tag::Boolean`].
    pub fn boolean(&self) -> bool {
        self.try_boolean().unwrap_or_else(|| self.mismatch("boolean"))
    }

    pub fn try_boolean(&self) -> Option<bool> {
        self.is_boolean().then(|| {
            let scope = self.handle.engine.enter();
            // SAFETY: lock held
            unsafe { JSValueToBoolean(scope.ctx(), self.raw) }
        })
    }

    /// # Panics
    /// If the tag is not [`Tag::String`].
    pub fn string(&self) -> String {
        self.try_string().unwrap_or_else(|| self.mismatch("string"))
    }

    pub fn try_string(&self) -> Option<String> {
        self.is_string().then(|| self.to_string())
    }

    /// # Panics
    /// If the value is not an object or function.
    pub fn object(&self) -> Object {
        self.try_object().unwrap_or_else(|| self.mismatch("object"))
    }

    pub fn try_object(&self) -> Option<Object> {
        self.is_object().then(|| Object::from_value(self.clone()))
    }

    /// Engine numeric coercion, as unary `+` would do.
    pub fn to_number(&self) -> BridgeResult<f64> {
        let scope = self.handle.engine.enter();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held
        let n = unsafe { JSValueToNumber(scope.ctx(), self.raw, &mut exception) };
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::conversion("number", self.tag));
        }
        Ok(n)
    }

    /// Numeric coercion rounded to the nearest 32-bit integer.
    ///
    /// Fails when the number is NaN or does not fit in 32 bits; it never
    /// wraps.
    pub fn to_int32(&self) -> BridgeResult<i32> {
        let n = self.to_number()?;
        to_int32(n).ok_or_else(|| BridgeError::conversion("int32", self.tag))
    }

    /// Engine truthiness. Never fails.
    pub fn to_boolean(&self) -> BridgeResult<bool> {
        let scope = self.handle.engine.enter();
        // SAFETY: lock held
        Ok(unsafe { JSValueToBoolean(scope.ctx(), self.raw) })
    }

    /// Engine stringification.
    ///
    /// Always produces a string; if stringification itself throws (a symbol,
    /// or a throwing `toString`), the failure is reported to the diagnostic
    /// hook and the result is empty.
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        let scope = self.handle.engine.enter();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; the copy is owned by us
        let copied = unsafe {
            JsString::adopt(JSValueToStringCopy(scope.ctx(), self.raw, &mut exception))
        };

        match copied {
            Some(text) if exception.is_null() => text.to_rust(),
            _ => {
                scope.report_exception(exception, None);
                String::new()
            }
        }
    }

    /// Engine object coercion. Fails for `null` and `undefined`.
    pub fn to_object(&self) -> BridgeResult<Object> {
        let scope = self.handle.engine.enter();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held
        let raw = unsafe { JSValueToObject(scope.ctx(), self.raw, &mut exception) };
        if !exception.is_null() || raw.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::conversion("object", self.tag));
        }
        Ok(Object::from_value(scope.wrap(raw)))
    }

    /// Call this value as a function. See [`Engine::call`].
    pub fn call(&self, args: &[Value]) -> BridgeResult<Value> {
        self.engine().call(self, args)
    }

    /// Serialize through the engine's `JSON.stringify`.
    ///
    /// `undefined` and other values with no JSON form become `null`.
    pub fn to_json(&self) -> BridgeResult<serde_json::Value> {
        let text = {
            let scope = self.handle.engine.enter();
            let mut exception: JSValueRef = ptr::null_mut();
            // SAFETY: lock held; the copy is owned by us
            let json = unsafe {
                JsString::adopt(JSValueCreateJSONString(scope.ctx(), self.raw, 0, &mut exception))
            };
            if !exception.is_null() {
                scope.report_exception(exception, None);
                return Err(BridgeError::conversion("json", self.tag));
            }
            match json {
                Some(json) => json.to_rust(),
                None => return Ok(serde_json::Value::Null),
            }
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Deserialize into a Rust type via JSON.
    pub fn deserialize<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        Ok(serde_json::from_value(self.to_json()?)?)
    }
}

impl Clone for Value {
    /// Registers a new root for the same engine value.
    fn clone(&self) -> Self {
        let scope = self.handle.engine.enter();
        scope.wrap(self.raw)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("tag", &self.tag)
            .field("root", &self.handle.id)
            .finish()
    }
}

/// Read `obj[name]`; `None` if the getter throws.
///
/// # Safety
/// Lock held; `obj` live in `ctx`.
pub(crate) unsafe fn property_raw(
    ctx: JSContextRef,
    obj: JSObjectRef,
    name: &str,
) -> Option<JSValueRef> {
    let name = CString::new(name).ok()?;
    // SAFETY: per caller contract
    unsafe {
        let js_name = JSStringCreateWithUTF8CString(name.as_ptr());
        let mut exception: JSValueRef = ptr::null_mut();
        let value = JSObjectGetProperty(ctx, obj, js_name, &mut exception);
        JSStringRelease(js_name);
        (exception.is_null() && !value.is_null()).then_some(value)
    }
}

/// Read `obj[name]` as a string, skipping `undefined`.
///
/// # Safety
/// Lock held; `obj` live in `ctx`.
pub(crate) unsafe fn property_string(
    ctx: JSContextRef,
    obj: JSObjectRef,
    name: &str,
) -> Option<String> {
    // SAFETY: per caller contract
    unsafe {
        let value = property_raw(ctx, obj, name)?;
        if JSValueIsUndefined(ctx, value) {
            return None;
        }
        let mut exception: JSValueRef = ptr::null_mut();
        let text = JsString::adopt(JSValueToStringCopy(ctx, value, &mut exception))?;
        exception.is_null().then(|| text.to_rust())
    }
}

/// Read `obj[name]` if it holds a number.
///
/// # Safety
/// Lock held; `obj` live in `ctx`.
pub(crate) unsafe fn property_number(
    ctx: JSContextRef,
    obj: JSObjectRef,
    name: &str,
) -> Option<f64> {
    // SAFETY: per caller contract
    unsafe {
        let value = property_raw(ctx, obj, name)?;
        if !JSValueIsNumber(ctx, value) {
            return None;
        }
        let n = JSValueToNumber(ctx, value, ptr::null_mut());
        (!n.is_nan()).then_some(n)
    }
}
