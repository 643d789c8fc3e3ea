//! # Host ABI
//!
//! C-compatible mirrors of the structures Fluent Bit hands to proxy output
//! plugins, the raw result and identification codes, and the small helpers
//! the bridge uses to read host memory.
//!
//! Nothing in here owns host memory. Every pointer field is written and read
//! exactly as the host lays it out; the bridge validates them before use.
use std::any::Any;
use std::ffi::{CStr, c_char, c_int, c_void};

use crate::plugin_system::error::FfiError;

/// The record batch could not be processed and must be dropped.
pub const FLB_ERROR: c_int = 0;
/// The record batch was processed normally.
pub const FLB_OK: c_int = 1;
/// Recoverable failure; the host re-delivers the same batch later.
pub const FLB_RETRY: c_int = 2;

/// Proxy type for output plugins (`flb_plugin_proxy_def.type`).
pub const FLB_PROXY_OUTPUT_PLUGIN: c_int = 2;
/// Proxy flavor the host uses to pick the Go-style calling convention.
pub const FLB_PROXY_GOLANG: c_int = 11;

/// `struct flb_plugin_proxy_def`, filled by `FLBPluginRegister`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlbPluginProxyDef {
    pub type_: c_int,
    pub proxy: c_int,
    pub flags: c_int,
    pub name: *mut c_char,
    pub description: *mut c_char,
}

impl Default for FlbPluginProxyDef {
    fn default() -> Self {
        Self {
            type_: 0,
            proxy: 0,
            flags: 0,
            name: std::ptr::null_mut(),
            description: std::ptr::null_mut(),
        }
    }
}

/// Signature of `flb_api.output_get_property`.
pub type OutputGetPropertyFn =
    unsafe extern "C" fn(key: *mut c_char, instance: *mut c_void) -> *mut c_char;

/// Leading part of `struct flb_api`.
///
/// The host struct carries more callbacks after this one; they are never
/// read through this mirror, so only the prefix is declared.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlbApi {
    pub output_get_property: Option<OutputGetPropertyFn>,
}

/// `struct flb_plugin_proxy_context`. The plugin stores its instance handle
/// in `remote_context`; the host passes it back to the `*Ctx` entry points.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlbPluginProxyContext {
    pub remote_context: *mut c_void,
}

/// Opaque `struct flb_output_instance`.
#[repr(C)]
pub struct FlbOutputInstance {
    _private: [u8; 0],
}

/// `struct flbgo_output_plugin`, the argument of `FLBPluginInit`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FlbGoOutputPlugin {
    pub _reserved: *mut c_void,
    pub api: *mut FlbApi,
    pub o_ins: *mut FlbOutputInstance,
    pub context: *mut FlbPluginProxyContext,
}

/// Safely converts an FFI C string pointer to a Rust String.
/// # Safety
/// The caller must ensure that `ptr` is a valid pointer to a null-terminated
/// C string, and that it remains valid for the duration of this function call.
pub unsafe fn ffi_string_from_ptr(ptr: *const c_char) -> Result<String, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_owned)
        .map_err(|_| FfiError::Utf8Error)
}

/// Borrows an optional FFI C string. A null pointer is `Ok(None)`.
/// # Safety
/// If `ptr` is non-null it must point to a null-terminated C string that
/// stays valid and unmodified for `'a`.
pub unsafe fn ffi_opt_str_from_ptr<'a>(ptr: *const c_char) -> Result<Option<&'a str>, FfiError> {
    if ptr.is_null() {
        Ok(None)
    } else {
        unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .map(Some)
            .map_err(|_| FfiError::Utf8Error)
    }
}

/// Extracts a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s_ref) = payload.downcast_ref::<&'static str>() {
        (*s_ref).to_string()
    } else if let Some(s_obj) = payload.downcast_ref::<String>() {
        s_obj.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
