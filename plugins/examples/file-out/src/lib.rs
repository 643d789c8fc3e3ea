//! Writes flushed records to a file.
//!
//! Properties:
//! - `path` (required): output file.
//! - `format`: `json` (one object per line, default) or `msgpack` (the raw
//!   batch as received).
//! - `append`: keep existing content (default `on`); `off` truncates on init.
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use flb_bridge_core::{
    FlushBuffer, OutputPlugin, PluginConfig, PluginError, PluginInfo, PluginResult, flb_output_plugin,
};
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Msgpack,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "msgpack" => Ok(OutputFormat::Msgpack),
            other => Err(format!("unknown format '{}', expected json or msgpack", other)),
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    tag: &'a str,
    time: f64,
    record: serde_json::Value,
}

/// Maps a write failure onto the host's retry semantics.
pub(crate) fn io_failure(context: &str, err: io::Error) -> PluginError {
    match err.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            PluginError::retry(format!("{}: {}", context, err))
        }
        _ => PluginError::error(format!("{}: {}", context, err)),
    }
}

/// Writes one rendered batch. A transient failure asks for a retry only while
/// no byte of the batch has reached the writer; once part of it is out, a
/// redelivery would duplicate that part, so the batch fails instead.
pub(crate) fn write_batch(writer: &mut impl Write, bytes: &[u8]) -> PluginResult {
    let mut written = 0;
    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => {
                return Err(PluginError::error(format!(
                    "write failed: output accepted no more data after {} of {} bytes",
                    written,
                    bytes.len()
                )));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if written == 0 => return Err(io_failure("write failed", e)),
            Err(e) => {
                return Err(PluginError::error(format!(
                    "write failed after {} of {} bytes: {}",
                    written,
                    bytes.len(),
                    e
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct FileOutPlugin {
    path: PathBuf,
    format: OutputFormat,
    file: Mutex<Option<File>>,
    bytes_written: AtomicU64,
}

impl FileOutPlugin {
    fn render(&self, buffer: &FlushBuffer<'_>) -> PluginResult<Vec<u8>> {
        match self.format {
            OutputFormat::Msgpack => {
                // A batch that fails to decode is not written.
                for record in buffer.records() {
                    record?;
                }
                Ok(buffer.data().to_vec())
            }
            OutputFormat::Json => {
                let mut out = Vec::with_capacity(buffer.len() * 2);
                for record in buffer.records() {
                    let record = record?;
                    let line = JsonLine {
                        tag: buffer.tag(),
                        time: record.time.as_secs_f64(),
                        record: record
                            .to_json()
                            .map_err(|e| PluginError::error(format!("record not representable as JSON: {}", e)))?,
                    };
                    serde_json::to_writer(&mut out, &line)
                        .map_err(|e| PluginError::error(format!("JSON rendering failed: {}", e)))?;
                    out.push(b'\n');
                }
                Ok(out)
            }
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

impl OutputPlugin for FileOutPlugin {
    fn plugin_register() -> PluginInfo {
        PluginInfo::new("rs_file", "Write records to a file as JSON lines or MessagePack")
    }

    fn plugin_init(&mut self, config: &PluginConfig<'_>) -> PluginResult {
        self.path = PathBuf::from(config.require("path")?);
        self.format = config.get_parsed::<OutputFormat>("format")?.unwrap_or_default();
        let append = config.get_bool_or("append", true)?;

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(&self.path)
            .map_err(|e| PluginError::error(format!("cannot open '{}': {}", self.path.display(), e)))?;

        *self.file.get_mut().unwrap_or_else(|p| p.into_inner()) = Some(file);
        info!(
            "Writing {:?} records to {} (append: {})",
            self.format,
            self.path.display(),
            append
        );
        Ok(())
    }

    fn plugin_flush(&self, buffer: &FlushBuffer<'_>) -> PluginResult {
        let bytes = self.render(buffer)?;
        let mut guard = self.file.lock().unwrap_or_else(|p| p.into_inner());
        let file = guard
            .as_mut()
            .ok_or_else(|| PluginError::error("output file is not open"))?;
        write_batch(file, &bytes)?;

        let total = self.bytes_written.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
        debug!("Wrote {} bytes to {} ({} total)", bytes.len(), self.path.display(), total);
        Ok(())
    }

    fn plugin_exit(&mut self) -> PluginResult {
        let Some(mut file) = self.file.get_mut().unwrap_or_else(|p| p.into_inner()).take() else {
            // Init failed before the file was opened.
            return Ok(());
        };
        file.flush().map_err(|e| io_failure("final flush failed", e))?;
        info!("Closed {} after {} bytes", self.path.display(), self.bytes_written());
        Ok(())
    }
}

flb_output_plugin!(FileOutPlugin);

#[cfg(test)]
mod tests;
