use std::borrow::Cow;
use std::ffi::{CString, c_char};

use crate::plugin_system::error::BridgeError;

/// Basic plugin information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    name: Cow<'static, str>,
    description: Cow<'static, str>,
}

impl PluginInfo {
    pub fn new(name: impl Into<Cow<'static, str>>, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Plugin's name, the value users pass to `-o` / `Name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plugin's description
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A [`PluginInfo`] together with the NUL-terminated copies handed to the host.
///
/// The bridge keeps one of these for the lifetime of the process, so the
/// pointers returned by [`name_ptr`](Self::name_ptr) and
/// [`description_ptr`](Self::description_ptr) never dangle.
#[derive(Debug)]
pub struct RegisteredInfo {
    info: PluginInfo,
    name: CString,
    description: CString,
}

impl RegisteredInfo {
    pub fn try_from_info(info: PluginInfo) -> Result<Self, BridgeError> {
        if info.name().trim().is_empty() {
            return Err(BridgeError::InvalidInfo {
                field: "name",
                message: "plugin name must not be empty".to_string(),
            });
        }
        let name = CString::new(info.name()).map_err(|e| BridgeError::InvalidInfo {
            field: "name",
            message: e.to_string(),
        })?;
        let description = CString::new(info.description()).map_err(|e| BridgeError::InvalidInfo {
            field: "description",
            message: e.to_string(),
        })?;
        Ok(Self {
            info,
            name,
            description,
        })
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn name_ptr(&self) -> *const c_char {
        self.name.as_ptr()
    }

    pub fn description_ptr(&self) -> *const c_char {
        self.description.as_ptr()
    }
}
