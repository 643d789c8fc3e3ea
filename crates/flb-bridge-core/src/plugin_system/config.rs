use std::collections::HashMap;
use std::ffi::{CString, c_char, c_void};
use std::fmt::Display;
use std::str::FromStr;

use log::warn;

use crate::ffi::{FlbApi, FlbOutputInstance, ffi_opt_str_from_ptr};
use crate::plugin_system::error::ConfigError;

/// Something that can answer configuration property lookups.
pub trait ConfigSource {
    /// Raw value of `key`, if the instance was configured with it.
    fn property(&self, key: &str) -> Option<String>;
}

/// Property lookup through the host's `output_get_property` callback.
#[derive(Debug)]
pub struct HostProperties {
    api: *const FlbApi,
    instance: *mut FlbOutputInstance,
}

impl HostProperties {
    /// # Safety
    /// `api` must be null or point to the host's `flb_api` for as long as this
    /// value is used. `instance` is passed back to the host verbatim.
    pub unsafe fn new(api: *const FlbApi, instance: *mut FlbOutputInstance) -> Self {
        Self { api, instance }
    }
}

impl ConfigSource for HostProperties {
    fn property(&self, key: &str) -> Option<String> {
        // SAFETY: validity of a non-null `api` is the constructor's contract.
        let Some(api) = (unsafe { self.api.as_ref() }) else {
            warn!("Host passed no API table; property '{}' treated as unset", key);
            return None;
        };
        let Some(get_property) = api.output_get_property else {
            warn!("Host API has no output_get_property; property '{}' treated as unset", key);
            return None;
        };
        let c_key = match CString::new(key) {
            Ok(k) => k,
            Err(_) => {
                warn!("Property key {:?} contains a NUL byte", key);
                return None;
            }
        };
        let value_ptr = unsafe {
            get_property(c_key.as_ptr() as *mut c_char, self.instance as *mut c_void)
        };
        // The returned string stays owned by the host; copy it out.
        match unsafe { ffi_opt_str_from_ptr(value_ptr) } {
            Ok(value) => value.map(str::to_owned),
            Err(e) => {
                warn!("Value of property '{}' is unreadable: {}", key, e);
                None
            }
        }
    }
}

/// In-memory property map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        // Host property names are case-insensitive.
        self.values.insert(key.into().to_lowercase(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for MapConfig {
    fn property(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_lowercase()).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = MapConfig::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}

/// Typed view over a [`ConfigSource`], handed to `plugin_init`.
///
/// Values are trimmed; an empty value counts as unset.
pub struct PluginConfig<'a> {
    source: &'a dyn ConfigSource,
}

impl<'a> PluginConfig<'a> {
    pub fn new(source: &'a dyn ConfigSource) -> Self {
        Self { source }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.source
            .property(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing { key: key.to_string() })
    }

    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => parse_bool(&value).map(Some).ok_or_else(|| ConfigError::Invalid {
                key: key.to_string(),
                value,
                reason: "expected on/off, true/false or yes/no".to_string(),
            }),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }
}

/// Boolean words accepted by the host's own configuration parser.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
