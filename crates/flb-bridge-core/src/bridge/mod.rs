//! # Boundary Adapter
//!
//! The only part of the crate that handles raw host memory.
//!
//! - **[`adapter`]**: [`Bridge`], generic over the plugin type, enforcing the
//!   lifecycle and translating raw host arguments.
//! - **[`instance`]**: [`InstanceTable`] and the generation-tagged
//!   [`InstanceHandle`] stored in the host's opaque context slot.
//! - **[`macros`]**: [`flb_output_plugin!`](crate::flb_output_plugin), which
//!   exports the host entry points for a plugin type.
pub mod adapter;
pub mod instance;
mod macros;

pub use adapter::Bridge;
pub use instance::{InstanceHandle, InstanceTable, LifecycleState};

// Test module declaration
#[cfg(test)]
mod tests;
