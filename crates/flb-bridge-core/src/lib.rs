//! Write Fluent Bit output plugins in Rust.
//!
//! A plugin implements [`OutputPlugin`] and exports it with
//! [`flb_output_plugin!`]; the resulting `cdylib` is loaded by the host like
//! any other proxy output plugin.
//!
//! ```ignore
//! use flb_bridge_core::{FlushBuffer, OutputPlugin, PluginConfig, PluginInfo, PluginResult};
//!
//! #[derive(Default)]
//! struct Stdout;
//!
//! impl OutputPlugin for Stdout {
//!     fn plugin_register() -> PluginInfo {
//!         PluginInfo::new("rs_stdout", "Print records to stdout")
//!     }
//!     fn plugin_init(&mut self, _config: &PluginConfig<'_>) -> PluginResult {
//!         Ok(())
//!     }
//!     fn plugin_flush(&self, buffer: &FlushBuffer<'_>) -> PluginResult {
//!         for record in buffer.records() {
//!             println!("[{}] {:?}", buffer.tag(), record?.body);
//!         }
//!         Ok(())
//!     }
//!     fn plugin_exit(&mut self) -> PluginResult {
//!         Ok(())
//!     }
//! }
//!
//! flb_bridge_core::flb_output_plugin!(Stdout);
//! ```
pub mod bridge;
pub mod ffi;
pub mod logging;
pub mod plugin_system;

// Re-export the plugin author's vocabulary at the crate root
pub use bridge::{Bridge, InstanceHandle, LifecycleState};
pub use ffi::{FLB_ERROR, FLB_OK, FLB_RETRY};
pub use plugin_system::{
    BridgeError, ConfigError, ConfigSource, EventTime, FlbResult, FlushBuffer, MapConfig, OutputPlugin,
    PluginConfig, PluginError, PluginInfo, PluginResult, Record, RecordError, encode_records,
};
