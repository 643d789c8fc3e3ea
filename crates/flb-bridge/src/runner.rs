use std::ffi::{CStr, CString};

use flb_bridge_core::{FlbResult, Record, encode_records};
use log::{debug, info, warn};

use crate::error::{HarnessError, Result};
use crate::host::Session;

/// Anything batches can be flushed into.
pub trait FlushTarget {
    fn flush(&self, data: &[u8], tag: &CStr) -> FlbResult;
}

impl FlushTarget for Session<'_> {
    fn flush(&self, data: &[u8], tag: &CStr) -> FlbResult {
        Session::flush(self, data, tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub tag: String,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tag: "flb_bridge.test".to_string(),
            batch_size: 100,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub records: usize,
    pub retries: usize,
    pub abandoned_batches: usize,
    pub abandoned_records: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.abandoned_batches == 0
    }
}

/// Encodes `records` in batches and flushes each one, redelivering the same
/// bytes on `RETRY` up to `max_retries` times.
pub fn deliver(target: &dyn FlushTarget, records: &[Record], options: &RunOptions) -> Result<RunSummary> {
    let tag = CString::new(options.tag.as_str()).map_err(|e| HarnessError::Property {
        key: "tag".to_string(),
        message: e.to_string(),
    })?;
    let mut summary = RunSummary::default();

    for (n, chunk) in records.chunks(options.batch_size.max(1)).enumerate() {
        let data = encode_records(chunk)?;
        let mut attempt = 0;
        loop {
            let result = target.flush(&data, &tag);
            debug!("Batch {} attempt {}: {}", n, attempt + 1, result);
            match result {
                FlbResult::Ok => {
                    summary.batches += 1;
                    summary.records += chunk.len();
                    break;
                }
                FlbResult::Retry if attempt < options.max_retries => {
                    attempt += 1;
                    summary.retries += 1;
                }
                FlbResult::Retry => {
                    warn!("Batch {} still RETRY after {} redeliveries; dropping it", n, attempt);
                    summary.abandoned_batches += 1;
                    summary.abandoned_records += chunk.len();
                    break;
                }
                FlbResult::Error => {
                    warn!("Batch {} failed with ERROR; dropping it", n);
                    summary.abandoned_batches += 1;
                    summary.abandoned_records += chunk.len();
                    break;
                }
            }
        }
    }

    info!(
        "Delivered {} records in {} batches ({} retries, {} batches dropped)",
        summary.records, summary.batches, summary.retries, summary.abandoned_batches
    );
    Ok(summary)
}
