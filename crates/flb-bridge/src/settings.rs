//! Harness settings: the properties handed to the plugin and run options.
//!
//! ```toml
//! [properties]
//! path = "/tmp/out.json"
//! append = true
//!
//! [run]
//! tag = "app.logs"
//! batch_size = 100
//! max_retries = 3
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{HarnessError, Result};

/// Settings file formats, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// A property value as written in the settings file. Fluent Bit properties
/// are strings, so every variant is rendered back to text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(true) => f.write_str("on"),
            PropertyValue::Bool(false) => f.write_str("off"),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub tag: Option<String>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub properties: BTreeMap<String, PropertyValue>,
    pub run: RunSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| HarnessError::UnsupportedFormat(path.to_path_buf()))?;
        let data = fs::read_to_string(path).map_err(|source| HarnessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data, format).map_err(|message| HarnessError::Settings {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Deserialize from string based on format
    pub fn parse(data: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| e.to_string()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| e.to_string()),
        }
    }

    /// Properties as the strings the plugin will see.
    pub fn property_strings(&self) -> BTreeMap<String, String> {
        self.properties
            .iter()
            .map(|(key, value)| (key.to_lowercase(), value.to_string()))
            .collect()
    }
}

/// Parses a `KEY=VALUE` command-line override.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_lowercase(), value.trim().to_string()))
        }
        _ => Err(HarnessError::PropertyOverride(raw.to_string())),
    }
}
