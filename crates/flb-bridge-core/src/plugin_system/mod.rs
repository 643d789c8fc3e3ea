//! # Plugin-Side Vocabulary
//!
//! Everything a plugin author works with. None of it touches raw host memory
//! except [`config::HostProperties`], which the bridge constructs.
//!
//! - **[`result`]**: [`FlbResult`], the three-valued outcome shared with the host.
//! - **[`error`]**: [`PluginError`] for plugin code, [`BridgeError`] for the adapter.
//! - **[`info`]**: [`PluginInfo`], the name and description shown to the host.
//! - **[`traits`]**: [`OutputPlugin`], the lifecycle every plugin implements.
//! - **[`config`]**: typed access to the instance's configuration properties.
//! - **[`records`]**: [`FlushBuffer`] and MessagePack record decoding.
pub mod config;
pub mod error;
pub mod info;
pub mod records;
pub mod result;
pub mod traits;

pub use config::{ConfigSource, HostProperties, MapConfig, PluginConfig};
pub use error::{BridgeError, ConfigError, PluginError, PluginResult, RecordError};
pub use info::{PluginInfo, RegisteredInfo};
pub use records::{EventTime, FlushBuffer, Record, encode_records};
pub use result::FlbResult;
pub use traits::OutputPlugin;

// Test module declaration
#[cfg(test)]
mod tests;
