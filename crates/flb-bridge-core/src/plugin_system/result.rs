use std::ffi::c_int;
use std::fmt;

use crate::ffi::{FLB_ERROR, FLB_OK, FLB_RETRY};
use crate::plugin_system::error::{BridgeError, PluginError};

/// Outcome of a lifecycle call as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlbResult {
    /// Processed normally.
    Ok,
    /// Unrecoverable failure for this call.
    Error,
    /// Recoverable; the host may re-deliver later.
    Retry,
}

impl FlbResult {
    /// Raw code agreed with the host.
    pub const fn code(self) -> c_int {
        match self {
            FlbResult::Ok => FLB_OK,
            FlbResult::Error => FLB_ERROR,
            FlbResult::Retry => FLB_RETRY,
        }
    }

    /// Parses a raw host code. Unknown codes are rejected, never treated as OK.
    pub fn from_code(code: c_int) -> Result<Self, BridgeError> {
        match code {
            FLB_OK => Ok(FlbResult::Ok),
            FLB_ERROR => Ok(FlbResult::Error),
            FLB_RETRY => Ok(FlbResult::Retry),
            _ => Err(BridgeError::Conversion { code }),
        }
    }

    pub fn is_ok(self) -> bool {
        self == FlbResult::Ok
    }

    pub fn from_plugin<T>(result: &Result<T, PluginError>) -> Self {
        match result {
            Ok(_) => FlbResult::Ok,
            Err(PluginError::Error(_)) => FlbResult::Error,
            Err(PluginError::Retry(_)) => FlbResult::Retry,
        }
    }
}

impl From<FlbResult> for c_int {
    fn from(result: FlbResult) -> Self {
        result.code()
    }
}

impl TryFrom<c_int> for FlbResult {
    type Error = BridgeError;

    fn try_from(code: c_int) -> Result<Self, BridgeError> {
        FlbResult::from_code(code)
    }
}

impl From<&BridgeError> for FlbResult {
    fn from(err: &BridgeError) -> Self {
        err.result_code()
    }
}

impl fmt::Display for FlbResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlbResult::Ok => write!(f, "OK"),
            FlbResult::Error => write!(f, "ERROR"),
            FlbResult::Retry => write!(f, "RETRY"),
        }
    }
}
