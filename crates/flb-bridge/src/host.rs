//! A minimal stand-in for the Fluent Bit proxy host.
//!
//! Loads a plugin shared object, resolves the proxy entry points and sets up
//! the structures `FLBPluginInit` expects, with an `output_get_property`
//! callback answering from an in-memory property table.
use std::collections::BTreeMap;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr;

use flb_bridge_core::FlbResult;
use flb_bridge_core::ffi::{
    FLB_PROXY_GOLANG, FLB_PROXY_OUTPUT_PLUGIN, FlbApi, FlbGoOutputPlugin, FlbOutputInstance,
    FlbPluginProxyContext, FlbPluginProxyDef, ffi_string_from_ptr,
};
use libloading::Library;
use log::{debug, info, warn};

use crate::error::{HarnessError, Result};

type RegisterFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type UnregisterFn = unsafe extern "C" fn(*mut c_void);
type InitFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type FlushFn = unsafe extern "C" fn(*const c_void, c_int, *const c_char) -> c_int;
type FlushCtxFn = unsafe extern "C" fn(*mut c_void, *const c_void, c_int, *const c_char) -> c_int;
type ExitFn = unsafe extern "C" fn() -> c_int;
type ExitCtxFn = unsafe extern "C" fn(*mut c_void) -> c_int;

/// What a plugin reported about itself on register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDefinition {
    pub name: String,
    pub description: String,
    pub plugin_type: c_int,
    pub proxy: c_int,
}

impl PluginDefinition {
    pub fn type_label(&self) -> &'static str {
        if self.plugin_type == FLB_PROXY_OUTPUT_PLUGIN { "output" } else { "unknown" }
    }

    pub fn proxy_label(&self) -> &'static str {
        if self.proxy == FLB_PROXY_GOLANG { "golang" } else { "unknown" }
    }
}

/// Reads a raw return code; anything outside the agreed set counts as ERROR.
fn interpret(operation: &str, code: c_int) -> FlbResult {
    FlbResult::from_code(code).unwrap_or_else(|e| {
        warn!("{} returned {}; treating it as ERROR", operation, e);
        FlbResult::Error
    })
}

/// A loaded plugin library and its resolved entry points.
pub struct PluginLibrary {
    path: PathBuf,
    register: RegisterFn,
    unregister: Option<UnregisterFn>,
    init: InitFn,
    flush: Option<FlushFn>,
    flush_ctx: Option<FlushCtxFn>,
    exit: Option<ExitFn>,
    exit_ctx: Option<ExitCtxFn>,
    // Keeps the code behind the function pointers above mapped.
    _library: Library,
}

impl PluginLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let library = unsafe { Library::new(path) }.map_err(|source| HarnessError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let required = |symbol: &'static str| HarnessError::MissingSymbol {
            path: path.to_path_buf(),
            symbol,
        };
        let plugin = unsafe {
            let register = lookup::<RegisterFn>(&library, "FLBPluginRegister").ok_or_else(|| required("FLBPluginRegister"))?;
            let init = lookup::<InitFn>(&library, "FLBPluginInit").ok_or_else(|| required("FLBPluginInit"))?;
            let flush = lookup::<FlushFn>(&library, "FLBPluginFlush");
            let flush_ctx = lookup::<FlushCtxFn>(&library, "FLBPluginFlushCtx");
            if flush.is_none() && flush_ctx.is_none() {
                return Err(required("FLBPluginFlush or FLBPluginFlushCtx"));
            }
            PluginLibrary {
                path: path.to_path_buf(),
                register,
                unregister: lookup::<UnregisterFn>(&library, "FLBPluginUnregister"),
                init,
                flush,
                flush_ctx,
                exit: lookup::<ExitFn>(&library, "FLBPluginExit"),
                exit_ctx: lookup::<ExitCtxFn>(&library, "FLBPluginExitCtx"),
                _library: library,
            }
        };
        info!("Loaded plugin library {}", plugin.path.display());
        Ok(plugin)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the optional entry points the library exports.
    pub fn optional_entry_points(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.unregister.is_some() {
            names.push("FLBPluginUnregister");
        }
        if self.flush.is_some() {
            names.push("FLBPluginFlush");
        }
        if self.flush_ctx.is_some() {
            names.push("FLBPluginFlushCtx");
        }
        if self.exit.is_some() {
            names.push("FLBPluginExit");
        }
        if self.exit_ctx.is_some() {
            names.push("FLBPluginExitCtx");
        }
        names
    }

    /// Calls `FLBPluginRegister` and copies out what the plugin filled in.
    pub fn register(&self) -> Result<PluginDefinition> {
        let mut def = FlbPluginProxyDef::default();
        let code = unsafe { (self.register)((&mut def as *mut FlbPluginProxyDef).cast()) };
        let result = interpret("FLBPluginRegister", code);
        if !result.is_ok() {
            return Err(HarnessError::Register(result));
        }

        let name = unsafe { ffi_string_from_ptr(def.name) }.map_err(|_| HarnessError::Definition { field: "name" })?;
        let description = unsafe { ffi_string_from_ptr(def.description) }
            .map_err(|_| HarnessError::Definition { field: "description" })?;
        let definition = PluginDefinition {
            name,
            description,
            plugin_type: def.type_,
            proxy: def.proxy,
        };
        if let Some(unregister) = self.unregister {
            unsafe { unregister((&mut def as *mut FlbPluginProxyDef).cast()) };
        }
        debug!("Plugin registered as {:?}", definition);
        Ok(definition)
    }

    /// Calls `FLBPluginInit` with the given properties.
    ///
    /// A session is returned even when init fails so that exit can still be
    /// delivered; check [`Session::init_result`].
    pub fn start(&self, properties: &BTreeMap<String, String>) -> Result<Session<'_>> {
        let mut host = HostMemory::new(properties)?;
        let code = unsafe { (self.init)(host.plugin_ptr()) };
        let init_result = interpret("FLBPluginInit", code);
        Ok(Session {
            library: self,
            host,
            init_result,
        })
    }
}

/// Resolves an exported function, `None` if the library lacks it.
///
/// # Safety
/// `T` must be the function pointer type the symbol was exported with.
unsafe fn lookup<T: Copy>(library: &Library, name: &str) -> Option<T> {
    match unsafe { library.get::<T>(name.as_bytes()) } {
        Ok(symbol) => Some(*symbol),
        Err(e) => {
            debug!("Symbol {} not found: {}", name, e);
            None
        }
    }
}

/// The host-side property store `o_ins` points at.
struct PropertyTable {
    values: Vec<(String, CString)>,
}

unsafe extern "C" fn get_property(key: *mut c_char, o_ins: *mut c_void) -> *mut c_char {
    if key.is_null() || o_ins.is_null() {
        return ptr::null_mut();
    }
    let table = unsafe { &*(o_ins as *const PropertyTable) };
    let Ok(key) = unsafe { CStr::from_ptr(key) }.to_str() else {
        return ptr::null_mut();
    };
    table
        .values
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map_or(ptr::null_mut(), |(_, v)| v.as_ptr().cast_mut())
}

/// Memory handed to the plugin during init. Boxed so the addresses stay put
/// for the whole session.
struct HostMemory {
    _api: Box<FlbApi>,
    _properties: Box<PropertyTable>,
    context: Box<FlbPluginProxyContext>,
    plugin: Box<FlbGoOutputPlugin>,
}

impl HostMemory {
    fn new(properties: &BTreeMap<String, String>) -> Result<Self> {
        let values = properties
            .iter()
            .map(|(key, value)| {
                CString::new(value.as_str())
                    .map(|v| (key.clone(), v))
                    .map_err(|e| HarnessError::Property {
                        key: key.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut api = Box::new(FlbApi {
            output_get_property: Some(get_property),
        });
        let mut table = Box::new(PropertyTable { values });
        let mut context = Box::new(FlbPluginProxyContext {
            remote_context: ptr::null_mut(),
        });
        let plugin = Box::new(FlbGoOutputPlugin {
            _reserved: ptr::null_mut(),
            api: &mut *api,
            o_ins: (&mut *table as *mut PropertyTable).cast::<FlbOutputInstance>(),
            context: &mut *context,
        });
        Ok(Self {
            _api: api,
            _properties: table,
            context,
            plugin,
        })
    }

    fn plugin_ptr(&mut self) -> *mut c_void {
        (&mut *self.plugin as *mut FlbGoOutputPlugin).cast()
    }

    fn remote_context(&self) -> *mut c_void {
        self.context.remote_context
    }
}

/// One initialized plugin instance.
pub struct Session<'lib> {
    library: &'lib PluginLibrary,
    host: HostMemory,
    init_result: FlbResult,
}

impl Session<'_> {
    pub fn init_result(&self) -> FlbResult {
        self.init_result
    }

    /// Delivers one encoded batch. Prefers the context entry point so the
    /// plugin sees this session's instance.
    pub fn flush(&self, data: &[u8], tag: &CStr) -> FlbResult {
        let Ok(length) = c_int::try_from(data.len()) else {
            warn!("Batch of {} bytes does not fit the host's length type", data.len());
            return FlbResult::Error;
        };
        let context = self.host.remote_context();
        let code = match (self.library.flush_ctx, self.library.flush) {
            (Some(flush_ctx), _) if !context.is_null() => unsafe {
                flush_ctx(context, data.as_ptr().cast(), length, tag.as_ptr())
            },
            (_, Some(flush)) => unsafe { flush(data.as_ptr().cast(), length, tag.as_ptr()) },
            (Some(flush_ctx), None) => unsafe { flush_ctx(context, data.as_ptr().cast(), length, tag.as_ptr()) },
            (None, None) => return FlbResult::Error,
        };
        interpret("flush", code)
    }

    /// Delivers exit and ends the session.
    pub fn exit(self) -> FlbResult {
        let context = self.host.remote_context();
        let code = match (self.library.exit_ctx, self.library.exit) {
            (Some(exit_ctx), _) if !context.is_null() => unsafe { exit_ctx(context) },
            (_, Some(exit)) => unsafe { exit() },
            _ => {
                debug!("Plugin exports no exit entry point");
                return FlbResult::Ok;
            }
        };
        interpret("exit", code)
    }
}
