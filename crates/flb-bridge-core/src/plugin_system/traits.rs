use crate::plugin_system::config::PluginConfig;
use crate::plugin_system::error::PluginResult;
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::records::FlushBuffer;

/// Core trait that every output plugin implements.
///
/// One value of the implementing type exists per host instance. The bridge
/// creates it with the plugin's factory right before [`plugin_init`]
/// and drops it right after [`plugin_exit`], so resources owned by the value
/// are released on every path, including a failed init.
///
/// # Call order
///
/// `plugin_register` → `plugin_init` → `plugin_flush`* → `plugin_exit`.
/// The bridge enforces this order: a flush that arrives before a successful
/// init, or after exit, is answered with `ERROR` without reaching the plugin.
///
/// # Concurrency
///
/// The host may flush one instance from several worker threads at once.
/// `plugin_flush` therefore takes `&self`, and synchronizing any state it
/// mutates (counters, writers, buffers) is the plugin's job. Init and exit
/// get exclusive access; exit waits for in-flight flushes to return.
///
/// [`plugin_init`]: OutputPlugin::plugin_init
/// [`plugin_exit`]: OutputPlugin::plugin_exit
pub trait OutputPlugin: Send + Sync + 'static {
    /// Describes the plugin to the host.
    ///
    /// Called once, before any instance exists. It must be pure and return the
    /// same value every time. A name that cannot be represented as a C string
    /// fails registration.
    fn plugin_register() -> PluginInfo;

    /// Prepares this instance before the engine starts.
    ///
    /// Read configuration through `config` and acquire resources here.
    /// Returning an error keeps the instance out of the flush path; the host
    /// may still call exit on it.
    fn plugin_init(&mut self, config: &PluginConfig<'_>) -> PluginResult;

    /// Processes one batch of records.
    ///
    /// The buffer is host memory that is only valid during this call; copy
    /// anything that must outlive it. Returning
    /// [`PluginError::Retry`](crate::PluginError::Retry) asks the host to
    /// deliver the same batch again later, so nothing irreversible may have
    /// been committed for it, or the processing must be idempotent.
    fn plugin_flush(&self, buffer: &FlushBuffer<'_>) -> PluginResult;

    /// Releases what the instance holds.
    ///
    /// Called at most once, after the last flush. When `plugin_init` fails it
    /// runs straight away instead, before the failure is reported to the
    /// host, so it must cope with partially acquired state.
    /// The instance is dropped afterwards whatever this returns.
    fn plugin_exit(&mut self) -> PluginResult;
}
