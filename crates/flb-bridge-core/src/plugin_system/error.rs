//! # Bridge Errors
//!
//! Error types shared by plugins and the boundary adapter.
//!
//! - [`PluginError`] is what plugin code returns from lifecycle methods. It is
//!   the only failure a plugin can express, and it maps onto the two non-OK
//!   wire codes.
//! - [`BridgeError`] is the adapter's internal taxonomy. Every variant
//!   collapses to a wire code through [`BridgeError::result_code`] before
//!   anything crosses back to the host.
//! - [`ConfigError`], [`RecordError`] and [`FfiError`] cover configuration
//!   lookup, flush-buffer decoding and raw string reads.
use std::ffi::c_int;

use thiserror::Error;

use crate::plugin_system::result::FlbResult;

/// Failure reported by a plugin lifecycle method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// Unrecoverable failure for this call.
    #[error("{0}")]
    Error(String),
    /// Recoverable failure; the host should re-deliver the same data later.
    #[error("retry requested: {0}")]
    Retry(String),
}

impl PluginError {
    pub fn error(message: impl Into<String>) -> Self {
        PluginError::Error(message.into())
    }

    pub fn retry(message: impl Into<String>) -> Self {
        PluginError::Retry(message.into())
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, PluginError::Retry(_))
    }
}

impl From<ConfigError> for PluginError {
    fn from(err: ConfigError) -> Self {
        PluginError::Error(err.to_string())
    }
}

impl From<RecordError> for PluginError {
    fn from(err: RecordError) -> Self {
        PluginError::Error(err.to_string())
    }
}

/// Result of a plugin lifecycle method.
pub type PluginResult<T = ()> = Result<T, PluginError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown result code {code}")]
    Conversion { code: c_int },

    #[error("contract violation during '{operation}': {message}")]
    ContractViolation {
        operation: &'static str,
        message: String,
    },

    #[error("invalid plugin info field '{field}': {message}")]
    InvalidInfo {
        field: &'static str,
        message: String,
    },

    #[error("plugin failed during '{operation}': {source}")]
    Plugin {
        operation: &'static str,
        #[source]
        source: PluginError,
    },

    #[error("plugin panicked during '{operation}': {message}")]
    Panic {
        operation: &'static str,
        message: String,
    },
}

impl BridgeError {
    pub(crate) fn contract(operation: &'static str, message: impl Into<String>) -> Self {
        BridgeError::ContractViolation {
            operation,
            message: message.into(),
        }
    }

    /// The wire code this failure is reported as. Only a plugin's own retry
    /// request becomes `RETRY`; everything else is `ERROR`.
    pub fn result_code(&self) -> FlbResult {
        match self {
            BridgeError::Plugin {
                source: PluginError::Retry(_),
                ..
            } => FlbResult::Retry,
            _ => FlbResult::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required property '{key}'")]
    Missing { key: String },

    #[error("invalid value '{value}' for property '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("failed to decode record #{index}: {message}")]
    Decode { index: usize, message: String },

    #[error("malformed record #{index}: {message}")]
    Malformed { index: usize, message: String },

    #[error("failed to encode record #{index}: {message}")]
    Encode { index: usize, message: String },
}

/// Failure reading a C string handed over by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FfiError {
    #[error("null pointer")]
    NullPointer,
    #[error("string is not valid UTF-8")]
    Utf8Error,
}
