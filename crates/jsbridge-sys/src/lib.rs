//! Raw FFI bindings to the JavaScriptCore C API.
//!
//! Only the surface needed by `jsbridge` is declared here: context groups and
//! global contexts, values and objects, script evaluation, the private
//! `JSScriptRef` API for compile-once/run-many units, and heap statistics.
//! Linking is configured by `build.rs`.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

// Opaque engine pointers
pub type JSContextGroupRef = *mut c_void;
pub type JSContextRef = *mut c_void;
pub type JSGlobalContextRef = *mut c_void;
pub type JSStringRef = *mut c_void;
pub type JSClassRef = *mut c_void;
pub type JSValueRef = *mut c_void;
pub type JSObjectRef = *mut c_void;
pub type JSScriptRef = *mut c_void;

// Property attributes
pub type JSPropertyAttributes = c_uint;
pub const K_JS_PROPERTY_ATTRIBUTE_NONE: JSPropertyAttributes = 0;
pub const K_JS_PROPERTY_ATTRIBUTE_READ_ONLY: JSPropertyAttributes = 1 << 1;
pub const K_JS_PROPERTY_ATTRIBUTE_DONT_ENUM: JSPropertyAttributes = 1 << 2;
pub const K_JS_PROPERTY_ATTRIBUTE_DONT_DELETE: JSPropertyAttributes = 1 << 3;

// Value types reported by JSValueGetType
pub type JSType = c_uint;
pub const K_JS_TYPE_UNDEFINED: JSType = 0;
pub const K_JS_TYPE_NULL: JSType = 1;
pub const K_JS_TYPE_BOOLEAN: JSType = 2;
pub const K_JS_TYPE_NUMBER: JSType = 3;
pub const K_JS_TYPE_STRING: JSType = 4;
pub const K_JS_TYPE_OBJECT: JSType = 5;
pub const K_JS_TYPE_SYMBOL: JSType = 6;
pub const K_JS_TYPE_BIGINT: JSType = 7;

pub type JSObjectCallAsFunctionCallback = Option<
    unsafe extern "C" fn(
        ctx: JSContextRef,
        function: JSObjectRef,
        this_object: JSObjectRef,
        argument_count: usize,
        arguments: *const JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSValueRef,
>;

#[cfg_attr(target_os = "macos", link(name = "JavaScriptCore", kind = "framework"))]
unsafe extern "C" {
    // Context groups and global contexts
    pub fn JSContextGroupCreate() -> JSContextGroupRef;
    pub fn JSContextGroupRelease(group: JSContextGroupRef);
    pub fn JSGlobalContextCreateInGroup(
        group: JSContextGroupRef,
        global_object_class: JSClassRef,
    ) -> JSGlobalContextRef;
    pub fn JSGlobalContextRelease(ctx: JSGlobalContextRef);
    pub fn JSContextGetGlobalObject(ctx: JSContextRef) -> JSObjectRef;

    // Strings
    pub fn JSStringCreateWithUTF8CString(string: *const c_char) -> JSStringRef;
    pub fn JSStringGetLength(string: JSStringRef) -> usize;
    pub fn JSStringGetMaximumUTF8CStringSize(string: JSStringRef) -> usize;
    pub fn JSStringGetUTF8CString(
        string: JSStringRef,
        buffer: *mut c_char,
        buffer_size: usize,
    ) -> usize;
    pub fn JSStringRelease(string: JSStringRef);

    // Value creation
    pub fn JSValueMakeUndefined(ctx: JSContextRef) -> JSValueRef;
    pub fn JSValueMakeNull(ctx: JSContextRef) -> JSValueRef;
    pub fn JSValueMakeBoolean(ctx: JSContextRef, boolean: bool) -> JSValueRef;
    pub fn JSValueMakeNumber(ctx: JSContextRef, number: f64) -> JSValueRef;
    pub fn JSValueMakeString(ctx: JSContextRef, string: JSStringRef) -> JSValueRef;
    pub fn JSValueMakeFromJSONString(ctx: JSContextRef, string: JSStringRef) -> JSValueRef;

    // Type inspection
    pub fn JSValueGetType(ctx: JSContextRef, value: JSValueRef) -> JSType;
    pub fn JSValueIsUndefined(ctx: JSContextRef, value: JSValueRef) -> bool;
    pub fn JSValueIsNumber(ctx: JSContextRef, value: JSValueRef) -> bool;
    pub fn JSValueIsObject(ctx: JSContextRef, value: JSValueRef) -> bool;
    pub fn JSValueIsArray(ctx: JSContextRef, value: JSValueRef) -> bool;

    // Coercion
    pub fn JSValueToBoolean(ctx: JSContextRef, value: JSValueRef) -> bool;
    pub fn JSValueToNumber(ctx: JSContextRef, value: JSValueRef, exception: *mut JSValueRef)
    -> f64;
    pub fn JSValueToStringCopy(
        ctx: JSContextRef,
        value: JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSStringRef;
    pub fn JSValueToObject(
        ctx: JSContextRef,
        value: JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSObjectRef;
    pub fn JSValueCreateJSONString(
        ctx: JSContextRef,
        value: JSValueRef,
        indent: c_uint,
        exception: *mut JSValueRef,
    ) -> JSStringRef;

    // GC root set
    pub fn JSValueProtect(ctx: JSContextRef, value: JSValueRef);
    pub fn JSValueUnprotect(ctx: JSContextRef, value: JSValueRef);

    // Objects and functions
    pub fn JSObjectMake(ctx: JSContextRef, js_class: JSClassRef, data: *mut c_void) -> JSObjectRef;
    pub fn JSObjectMakeArray(
        ctx: JSContextRef,
        argument_count: usize,
        arguments: *const JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSObjectRef;
    pub fn JSObjectMakeFunctionWithCallback(
        ctx: JSContextRef,
        name: JSStringRef,
        callback: JSObjectCallAsFunctionCallback,
    ) -> JSObjectRef;
    pub fn JSObjectIsFunction(ctx: JSContextRef, object: JSObjectRef) -> bool;
    pub fn JSObjectCallAsFunction(
        ctx: JSContextRef,
        object: JSObjectRef,
        this_object: JSObjectRef,
        argument_count: usize,
        arguments: *const JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSValueRef;

    // Properties
    pub fn JSObjectGetProperty(
        ctx: JSContextRef,
        object: JSObjectRef,
        property_name: JSStringRef,
        exception: *mut JSValueRef,
    ) -> JSValueRef;
    pub fn JSObjectSetProperty(
        ctx: JSContextRef,
        object: JSObjectRef,
        property_name: JSStringRef,
        value: JSValueRef,
        attributes: JSPropertyAttributes,
        exception: *mut JSValueRef,
    );
    pub fn JSObjectGetPropertyAtIndex(
        ctx: JSContextRef,
        object: JSObjectRef,
        property_index: c_uint,
        exception: *mut JSValueRef,
    ) -> JSValueRef;
    pub fn JSObjectSetPropertyAtIndex(
        ctx: JSContextRef,
        object: JSObjectRef,
        property_index: c_uint,
        value: JSValueRef,
        exception: *mut JSValueRef,
    );

    // One-shot evaluation
    pub fn JSEvaluateScript(
        ctx: JSContextRef,
        script: JSStringRef,
        this_object: JSObjectRef,
        source_url: JSStringRef,
        starting_line_number: c_int,
        exception: *mut JSValueRef,
    ) -> JSValueRef;

    // Compiled scripts (JSScriptRefPrivate.h)
    pub fn JSScriptCreateFromString(
        group: JSContextGroupRef,
        url: JSStringRef,
        starting_line_number: c_int,
        source: JSStringRef,
        error_message: *mut JSStringRef,
        error_line: *mut c_int,
    ) -> JSScriptRef;
    pub fn JSScriptRetain(script: JSScriptRef);
    pub fn JSScriptRelease(script: JSScriptRef);
    pub fn JSScriptEvaluate(
        ctx: JSContextRef,
        script: JSScriptRef,
        this_value: JSValueRef,
        exception: *mut JSValueRef,
    ) -> JSValueRef;

    // Collector (JSBasePrivate.h for the statistics object)
    pub fn JSGarbageCollect(ctx: JSContextRef);
    pub fn JSGetMemoryUsageStatistics(ctx: JSContextRef) -> JSObjectRef;
}
