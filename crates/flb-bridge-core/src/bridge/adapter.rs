use std::ffi::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use log::{debug, error, info, warn};

use crate::bridge::instance::{
    Instance, InstanceHandle, InstanceTable, LifecycleState, read_instance, write_instance,
};
use crate::ffi::{
    FLB_OK, FLB_PROXY_GOLANG, FLB_PROXY_OUTPUT_PLUGIN, FlbGoOutputPlugin,
    FlbPluginProxyDef, ffi_opt_str_from_ptr, panic_message,
};
use crate::plugin_system::config::{ConfigSource, HostProperties, PluginConfig};
use crate::plugin_system::error::BridgeError;
use crate::plugin_system::info::RegisteredInfo;
use crate::plugin_system::records::FlushBuffer;
use crate::plugin_system::traits::OutputPlugin;

/// Runs plugin code, turning a panic into [`BridgeError::Panic`].
fn catch_plugin_panic<T>(operation: &'static str, f: impl FnOnce() -> T) -> Result<T, BridgeError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| BridgeError::Panic {
        operation,
        message: panic_message(&*payload),
    })
}

/// Generic adapter between the host's calling convention and one
/// [`OutputPlugin`] type.
///
/// A plugin binary keeps a single `Bridge` in a `static` (see
/// [`flb_output_plugin!`](crate::flb_output_plugin)). The safe methods
/// (`register`, `create_instance`, `init_instance`, `flush`, `exit`) hold the
/// lifecycle rules; the `ffi_*` methods validate host arguments, call the
/// safe layer and collapse the outcome into a wire code.
pub struct Bridge<P, F = fn() -> P> {
    factory: F,
    info: OnceLock<RegisteredInfo>,
    instances: InstanceTable<P>,
}

impl<P, F> Bridge<P, F> {
    pub const fn new(factory: F) -> Self {
        Self {
            factory,
            info: OnceLock::new(),
            instances: InstanceTable::new(),
        }
    }

    pub fn instances(&self) -> &InstanceTable<P> {
        &self.instances
    }

    pub fn is_registered(&self) -> bool {
        self.info.get().is_some()
    }

    pub fn registered_info(&self) -> Option<&RegisteredInfo> {
        self.info.get()
    }
}

impl<P, F> Bridge<P, F>
where
    P: OutputPlugin,
    F: Fn() -> P + Send + Sync,
{
    /// Asks the plugin for its [`PluginInfo`](crate::PluginInfo) once and keeps
    /// the C string copies for the rest of the process.
    pub fn register(&self) -> Result<&RegisteredInfo, BridgeError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let info = catch_plugin_panic("register", P::plugin_register)?;
        let registered = RegisteredInfo::try_from_info(info)?;
        Ok(self.info.get_or_init(|| registered))
    }

    /// Overall state when no instance is involved, or the state of `handle`.
    /// `None` for a handle that was never issued or has been released.
    pub fn state(&self, handle: Option<InstanceHandle>) -> Option<LifecycleState> {
        match handle {
            None if self.is_registered() => Some(LifecycleState::Registered),
            None => Some(LifecycleState::Unregistered),
            Some(handle) => {
                let entry = self.instances.get(handle)?;
                let state = read_instance(&entry).state;
                Some(state)
            }
        }
    }

    /// Number of flushes the plugin has accepted for `handle`.
    pub fn flush_count(&self, handle: InstanceHandle) -> Option<u64> {
        let entry = self.instances.get(handle)?;
        let count = read_instance(&entry)
            .flushes
            .load(std::sync::atomic::Ordering::Relaxed);
        Some(count)
    }

    /// Builds a fresh plugin value and files it in the instance table.
    pub fn create_instance(&self) -> Result<InstanceHandle, BridgeError> {
        if !self.is_registered() {
            return Err(BridgeError::contract("init", "plugin has not been registered"));
        }
        let plugin = catch_plugin_panic("init", || (self.factory)())?;
        let handle = self.instances.insert(Instance::new(plugin))?;
        debug!("Created plugin instance {}", handle);
        Ok(handle)
    }

    /// Runs `plugin_init` for a freshly created instance.
    ///
    /// On failure the plugin's `plugin_exit` runs straight away and the value
    /// is dropped before the error is returned. The handle stays in the table
    /// as `InitFailed`: flushes are rejected and a later exit is a no-op.
    pub fn init_instance(&self, handle: InstanceHandle, source: &dyn ConfigSource) -> Result<(), BridgeError> {
        let entry = self
            .instances
            .get(handle)
            .ok_or_else(|| BridgeError::contract("init", format!("unknown instance handle {}", handle)))?;
        let mut instance = write_instance(&entry);
        if instance.state != LifecycleState::Registered {
            return Err(BridgeError::contract(
                "init",
                format!("instance {} is {}, expected registered", handle, instance.state),
            ));
        }
        let plugin = instance
            .plugin
            .as_mut()
            .ok_or_else(|| BridgeError::contract("init", format!("instance {} has no plugin value", handle)))?;

        let config = PluginConfig::new(source);
        let outcome = catch_plugin_panic("init", || plugin.plugin_init(&config))
            .and_then(|result| result.map_err(|source| BridgeError::Plugin { operation: "init", source }));
        match &outcome {
            Ok(()) => instance.state = LifecycleState::Initialized,
            Err(_) => {
                instance.state = LifecycleState::InitFailed;
                release_failed(handle, instance.plugin.take());
            }
        }
        outcome
    }

    /// Delivers one batch to an initialized instance.
    ///
    /// An empty batch is acknowledged without calling the plugin.
    pub fn flush(&self, handle: InstanceHandle, buffer: &FlushBuffer<'_>) -> Result<(), BridgeError> {
        let entry = self
            .instances
            .get(handle)
            .ok_or_else(|| BridgeError::contract("flush", format!("unknown or released instance handle {}", handle)))?;
        let instance = read_instance(&entry);
        if instance.state != LifecycleState::Initialized {
            return Err(BridgeError::contract(
                "flush",
                format!("instance {} is {}, expected initialized", handle, instance.state),
            ));
        }
        if buffer.is_empty() {
            debug!("Empty flush for instance {} acknowledged", handle);
            return Ok(());
        }

        let plugin = instance
            .plugin
            .as_ref()
            .ok_or_else(|| BridgeError::contract("flush", format!("instance {} has no plugin value", handle)))?;
        let result = catch_plugin_panic("flush", || plugin.plugin_flush(buffer))?;
        result.map_err(|source| BridgeError::Plugin { operation: "flush", source })?;
        let count = instance.record_flush();
        debug!("Instance {} flushed {} bytes (flush #{})", handle, buffer.len(), count);
        Ok(())
    }

    /// Runs `plugin_exit`, retires the handle and drops the plugin value.
    pub fn exit(&self, handle: InstanceHandle) -> Result<(), BridgeError> {
        let entry = self
            .instances
            .remove(handle)
            .ok_or_else(|| BridgeError::contract("exit", format!("unknown or already exited instance {}", handle)))?;
        // Waits for flushes still running on other threads.
        let mut instance = write_instance(&entry);
        let previous = std::mem::replace(&mut instance.state, LifecycleState::Exited);
        let plugin = instance.plugin.take();

        let outcome = match (previous, plugin) {
            (LifecycleState::Initialized, Some(mut plugin)) => {
                catch_plugin_panic("exit", || plugin.plugin_exit())
                    .and_then(|result| result.map_err(|source| BridgeError::Plugin { operation: "exit", source }))
            }
            // Init never ran, or its failure already released everything.
            (LifecycleState::Registered | LifecycleState::InitFailed, _) => Ok(()),
            (LifecycleState::Initialized, None) => Err(BridgeError::contract(
                "exit",
                format!("instance {} has no plugin value", handle),
            )),
            (LifecycleState::Unregistered | LifecycleState::Exited, _) => Err(BridgeError::contract(
                "exit",
                format!("instance {} is {}", handle, previous),
            )),
        };
        drop(instance);
        drop(entry);
        info!("Plugin instance {} exited", handle);
        outcome
    }
}

/// Host-facing entry points. Each one validates the raw arguments, runs the
/// safe layer and answers with `FLB_OK`, `FLB_ERROR` or `FLB_RETRY`. Nothing
/// unwinds out of these functions.
impl<P, F> Bridge<P, F>
where
    P: OutputPlugin,
    F: Fn() -> P + Send + Sync,
{
    /// `FLBPluginRegister`.
    ///
    /// # Safety
    /// `def` must be null or point to a writable `flb_plugin_proxy_def`.
    pub unsafe fn ffi_register(&self, def: *mut c_void) -> c_int {
        crate::logging::init();
        boundary("register", || unsafe { self.try_register(def.cast()) })
    }

    unsafe fn try_register(&self, def: *mut FlbPluginProxyDef) -> Result<(), BridgeError> {
        let def = unsafe { def.as_mut() }
            .ok_or_else(|| BridgeError::contract("register", "null proxy definition"))?;
        let info = self.register()?;
        def.type_ = FLB_PROXY_OUTPUT_PLUGIN;
        def.proxy = FLB_PROXY_GOLANG;
        def.flags = 0;
        // Static storage; the host must not free these (see ffi_unregister).
        def.name = info.name_ptr().cast_mut();
        def.description = info.description_ptr().cast_mut();
        info!("Registered output plugin '{}'", info.info().name());
        Ok(())
    }

    /// `FLBPluginUnregister`. Clears the name and description pointers so the
    /// host has nothing of ours to release.
    ///
    /// # Safety
    /// `def` must be null or point to a writable `flb_plugin_proxy_def`.
    pub unsafe fn ffi_unregister(&self, def: *mut c_void) {
        let _ = boundary("unregister", || {
            if let Some(def) = unsafe { def.cast::<FlbPluginProxyDef>().as_mut() } {
                def.name = std::ptr::null_mut();
                def.description = std::ptr::null_mut();
            }
            Ok(())
        });
    }

    /// `FLBPluginInit`.
    ///
    /// # Safety
    /// `plugin` must be null or point to the host's `flbgo_output_plugin`, whose
    /// non-null `api` and `context` pointers are valid for the call.
    pub unsafe fn ffi_init(&self, plugin: *mut c_void) -> c_int {
        boundary("init", || unsafe { self.try_init(plugin.cast()) })
    }

    unsafe fn try_init(&self, plugin: *mut FlbGoOutputPlugin) -> Result<(), BridgeError> {
        let plugin = unsafe { plugin.as_ref() }
            .ok_or_else(|| BridgeError::contract("init", "null plugin pointer"))?;
        let handle = self.create_instance()?;

        match unsafe { plugin.context.as_mut() } {
            Some(context) => context.remote_context = handle.into_context(),
            None => warn!(
                "Host passed no proxy context; instance {} is reachable only through the context-less entry points",
                handle
            ),
        }

        let properties = unsafe { HostProperties::new(plugin.api, plugin.o_ins) };
        self.init_instance(handle, &properties)
    }

    /// `FLBPluginFlush`: flushes the primary instance.
    ///
    /// # Safety
    /// `data` must be null or valid for `length` bytes; `tag` must be null or a
    /// NUL-terminated string. Both only for the duration of the call.
    pub unsafe fn ffi_flush(&self, data: *const c_void, length: c_int, tag: *const c_char) -> c_int {
        boundary("flush", || {
            let handle = self
                .instances
                .primary()
                .ok_or_else(|| BridgeError::contract("flush", "no initialized instance"))?;
            unsafe { self.try_flush(handle, data, length, tag) }
        })
    }

    /// `FLBPluginFlushCtx`.
    ///
    /// # Safety
    /// As [`ffi_flush`](Self::ffi_flush). `context` is only decoded, never
    /// dereferenced.
    pub unsafe fn ffi_flush_ctx(
        &self,
        context: *mut c_void,
        data: *const c_void,
        length: c_int,
        tag: *const c_char,
    ) -> c_int {
        boundary("flush", || {
            let handle = handle_from_context("flush", context)?;
            unsafe { self.try_flush(handle, data, length, tag) }
        })
    }

    unsafe fn try_flush(
        &self,
        handle: InstanceHandle,
        data: *const c_void,
        length: c_int,
        tag: *const c_char,
    ) -> Result<(), BridgeError> {
        let length = usize::try_from(length)
            .map_err(|_| BridgeError::contract("flush", format!("negative buffer length {}", length)))?;
        let bytes: &[u8] = if length == 0 {
            &[]
        } else if data.is_null() {
            return Err(BridgeError::contract("flush", format!("null buffer with length {}", length)));
        } else {
            unsafe { std::slice::from_raw_parts(data.cast::<u8>(), length) }
        };
        let tag = unsafe { ffi_opt_str_from_ptr(tag) }
            .map_err(|e| BridgeError::contract("flush", format!("record tag: {}", e)))?
            .unwrap_or("");
        self.flush(handle, &FlushBuffer::new(bytes, tag))
    }

    /// `FLBPluginExit`: exits the primary instance.
    pub fn ffi_exit(&self) -> c_int {
        boundary("exit", || {
            let handle = self
                .instances
                .primary()
                .ok_or_else(|| BridgeError::contract("exit", "no live instance"))?;
            self.exit(handle)
        })
    }

    /// `FLBPluginExitCtx`. `context` is only decoded, never dereferenced.
    pub fn ffi_exit_ctx(&self, context: *mut c_void) -> c_int {
        boundary("exit", || {
            let handle = handle_from_context("exit", context)?;
            self.exit(handle)
        })
    }
}

/// Undoes a failed `plugin_init`. Problems are logged; the init error is
/// what the caller reports.
fn release_failed<P: OutputPlugin>(handle: InstanceHandle, plugin: Option<P>) {
    let Some(mut plugin) = plugin else {
        return;
    };
    match catch_plugin_panic("exit", || plugin.plugin_exit()) {
        Ok(Ok(())) => debug!("Released instance {} after failed init", handle),
        Ok(Err(err)) => warn!("Cleanup of instance {} after failed init: {}", handle, err),
        Err(err) => warn!("Cleanup of instance {} after failed init: {}", handle, err),
    }
}

fn handle_from_context(operation: &'static str, context: *mut c_void) -> Result<InstanceHandle, BridgeError> {
    InstanceHandle::from_context(context).ok_or_else(|| BridgeError::contract(operation, "null context"))
}

/// Last line before the host: logs the failure and returns the wire code.
fn boundary(operation: &'static str, f: impl FnOnce() -> Result<(), BridgeError>) -> c_int {
    let result = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(BridgeError::Panic {
            operation,
            message: panic_message(&*payload),
        }),
    };
    match result {
        Ok(()) => FLB_OK,
        Err(err) => {
            match &err {
                BridgeError::Plugin { source, .. } if source.is_retry() => {
                    warn!("{} returned RETRY: {}", operation, err)
                }
                BridgeError::ContractViolation { .. } | BridgeError::Conversion { .. } => {
                    warn!("Rejected host call: {}", err)
                }
                _ => error!("{}", err),
            }
            err.result_code().code()
        }
    }
}
