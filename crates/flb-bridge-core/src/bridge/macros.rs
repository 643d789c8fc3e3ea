/// Exports an [`OutputPlugin`](crate::OutputPlugin) to the host.
///
/// Expands to a static [`Bridge`](crate::bridge::Bridge) for the given type and
/// the `extern "C"` entry points the host's loader resolves by name:
/// `FLBPluginRegister`, `FLBPluginUnregister`, `FLBPluginInit`,
/// `FLBPluginFlush`, `FLBPluginFlushCtx`, `FLBPluginExit` and
/// `FLBPluginExitCtx`. It also defines `output_bridge()`, which returns the
/// static bridge, for tests.
///
/// Instances are created with `Default::default()` unless a factory is given.
/// The factory must be a function path or a non-capturing closure.
///
/// ```ignore
/// flb_output_plugin!(StdoutPlugin);
/// flb_output_plugin!(FilePlugin, || FilePlugin::with_buffer_size(64 * 1024));
/// ```
///
/// Use it once per `cdylib`.
#[macro_export]
macro_rules! flb_output_plugin {
    ($plugin:ty) => {
        $crate::flb_output_plugin!($plugin, <$plugin as ::core::default::Default>::default);
    };
    ($plugin:ty, $factory:expr) => {
        static FLB_OUTPUT_BRIDGE: $crate::bridge::Bridge<$plugin> =
            $crate::bridge::Bridge::<$plugin, fn() -> $plugin>::new($factory);

        #[allow(dead_code)]
        pub(crate) fn output_bridge() -> &'static $crate::bridge::Bridge<$plugin> {
            &FLB_OUTPUT_BRIDGE
        }

        /// # Safety
        /// `def` must be null or point to the host's `flb_plugin_proxy_def`.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn FLBPluginRegister(def: *mut ::std::ffi::c_void) -> ::std::ffi::c_int {
            unsafe { FLB_OUTPUT_BRIDGE.ffi_register(def) }
        }

        /// # Safety
        /// `def` must be null or point to the host's `flb_plugin_proxy_def`.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn FLBPluginUnregister(def: *mut ::std::ffi::c_void) {
            unsafe { FLB_OUTPUT_BRIDGE.ffi_unregister(def) }
        }

        /// # Safety
        /// `plugin` must be null or point to the host's `flbgo_output_plugin`.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn FLBPluginInit(plugin: *mut ::std::ffi::c_void) -> ::std::ffi::c_int {
            unsafe { FLB_OUTPUT_BRIDGE.ffi_init(plugin) }
        }

        /// # Safety
        /// `data` must be valid for `length` bytes and `tag` a C string, both
        /// for the duration of the call.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn FLBPluginFlush(
            data: *const ::std::ffi::c_void,
            length: ::std::ffi::c_int,
            tag: *const ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            unsafe { FLB_OUTPUT_BRIDGE.ffi_flush(data, length, tag) }
        }

        /// # Safety
        /// As `FLBPluginFlush`; `ctx` is the value stored by `FLBPluginInit`.
        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn FLBPluginFlushCtx(
            ctx: *mut ::std::ffi::c_void,
            data: *const ::std::ffi::c_void,
            length: ::std::ffi::c_int,
            tag: *const ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            unsafe { FLB_OUTPUT_BRIDGE.ffi_flush_ctx(ctx, data, length, tag) }
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn FLBPluginExit() -> ::std::ffi::c_int {
            FLB_OUTPUT_BRIDGE.ffi_exit()
        }

        #[unsafe(no_mangle)]
        #[allow(non_snake_case)]
        pub extern "C" fn FLBPluginExitCtx(ctx: *mut ::std::ffi::c_void) -> ::std::ffi::c_int {
            FLB_OUTPUT_BRIDGE.ffi_exit_ctx(ctx)
        }
    };
}
