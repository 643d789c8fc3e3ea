use std::path::PathBuf;

use flb_bridge_core::{FlbResult, RecordError};
use thiserror::Error;

/// Everything that can stop the harness before or while driving a plugin.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to load plugin library '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("plugin library '{path}' does not export {symbol}")]
    MissingSymbol { path: PathBuf, symbol: &'static str },

    #[error("FLBPluginRegister returned {0}")]
    Register(FlbResult),

    #[error("plugin definition has an unreadable {field}")]
    Definition { field: &'static str },

    #[error("FLBPluginInit returned {0}")]
    Init(FlbResult),

    #[error("property '{key}' cannot be passed to the plugin: {message}")]
    Property { key: String, message: String },

    #[error("invalid property override '{0}', expected KEY=VALUE")]
    PropertyOverride(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported settings format for '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("invalid settings file '{path}': {message}")]
    Settings { path: PathBuf, message: String },

    #[error("{path}:{line}: {message}")]
    Input {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
