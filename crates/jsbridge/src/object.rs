//! Object handles with element and property access

use std::ffi::c_uint;
use std::fmt;
use std::ptr;

use jsbridge_sys::*;

use crate::engine::Scope;
use crate::error::{BridgeError, BridgeResult};
use crate::string::JsString;
use crate::value::{Tag, Value};

/// A rooted handle to an engine object (functions and arrays included).
pub struct Object {
    value: Value,
}

impl Object {
    pub(crate) fn from_value(value: Value) -> Self {
        debug_assert!(value.is_object(), "object handle over {}", value.tag());
        Self { value }
    }

    fn raw(&self) -> JSObjectRef {
        self.value.raw() as JSObjectRef
    }

    fn scope(&self) -> Scope<'_> {
        self.value.handle().engine().enter()
    }

    /// The object as a plain value handle, borrowed.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// A new value handle for the same object.
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_array(&self) -> bool {
        let scope = self.scope();
        // SAFETY: lock held; object rooted by self
        unsafe { JSValueIsArray(scope.ctx(), self.value.raw()) }
    }

    pub fn is_function(&self) -> bool {
        self.value.is_function()
    }

    /// `length` of an array.
    pub fn array_length(&self) -> BridgeResult<u32> {
        if !self.is_array() {
            return Err(BridgeError::conversion("array", self.value.tag()));
        }
        let length = self.get_property("length")?;
        length.to_number().map(|n| n as u32)
    }

    /// Truncate or extend an array by assigning its `length`.
    pub fn set_array_length(&self, length: u32) -> BridgeResult<()> {
        if !self.is_array() {
            return Err(BridgeError::conversion("array", self.value.tag()));
        }
        let length = self.value.engine().number(f64::from(length));
        self.set_property("length", &length)
    }

    pub fn get_element(&self, index: u32) -> BridgeResult<Value> {
        let scope = self.scope();
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; object rooted by self
        let raw = unsafe {
            JSObjectGetPropertyAtIndex(scope.ctx(), self.raw(), index as c_uint, &mut exception)
        };
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property(format!("[{index}]")));
        }
        Ok(scope.wrap(raw))
    }

    pub fn set_element(&self, index: u32, value: &Value) -> BridgeResult<()> {
        let scope = self.scope();
        scope.check_owner(value.handle());
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; both handles rooted
        unsafe {
            JSObjectSetPropertyAtIndex(
                scope.ctx(),
                self.raw(),
                index as c_uint,
                value.raw(),
                &mut exception,
            );
        }
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property(format!("[{index}]")));
        }
        Ok(())
    }

    /// Read a named property; a missing property reads as `undefined`.
    pub fn get_property(&self, name: &str) -> BridgeResult<Value> {
        let scope = self.scope();
        let key = JsString::new(name)?;
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; object rooted by self
        let raw =
            unsafe { JSObjectGetProperty(scope.ctx(), self.raw(), key.raw(), &mut exception) };
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property(name.to_string()));
        }
        Ok(scope.wrap(raw))
    }

    pub fn set_property(&self, name: &str, value: &Value) -> BridgeResult<()> {
        let scope = self.scope();
        scope.check_owner(value.handle());
        let key = JsString::new(name)?;
        let mut exception: JSValueRef = ptr::null_mut();
        // SAFETY: lock held; both handles rooted
        unsafe {
            JSObjectSetProperty(
                scope.ctx(),
                self.raw(),
                key.raw(),
                value.raw(),
                K_JS_PROPERTY_ATTRIBUTE_NONE,
                &mut exception,
            );
        }
        if !exception.is_null() {
            scope.report_exception(exception, None);
            return Err(BridgeError::Property(name.to_string()));
        }
        Ok(())
    }

    pub fn tag(&self) -> Tag {
        self.value.tag()
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        object.value
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("tag", &self.value.tag())
            .field("root", &self.value.root_id())
            .finish()
    }
}
