//! Counts what the host flushes and reports the totals on exit.
use std::sync::atomic::{AtomicU64, Ordering};

use flb_bridge_core::{FlushBuffer, OutputPlugin, PluginConfig, PluginInfo, PluginResult, flb_output_plugin};
use log::{debug, info};

#[derive(Debug, Default)]
pub struct CounterPlugin {
    label: String,
    flushes: AtomicU64,
    records: AtomicU64,
}

impl CounterPlugin {
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }
}

impl OutputPlugin for CounterPlugin {
    fn plugin_register() -> PluginInfo {
        PluginInfo::new("rs_counter", "Counts flushed batches and records")
    }

    fn plugin_init(&mut self, config: &PluginConfig<'_>) -> PluginResult {
        self.label = config.get_or("label", "counter");
        info!("[{}] counter ready", self.label);
        Ok(())
    }

    fn plugin_flush(&self, buffer: &FlushBuffer<'_>) -> PluginResult {
        let mut batch = 0;
        for record in buffer.records() {
            record?;
            batch += 1;
        }
        let flushes = self.flushes.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.records.fetch_add(batch, Ordering::Relaxed) + batch;
        debug!(
            "[{}] flush #{} tag={} records={} total={}",
            self.label,
            flushes,
            buffer.tag(),
            batch,
            total
        );
        Ok(())
    }

    fn plugin_exit(&mut self) -> PluginResult {
        info!(
            "[{}] {} flushes, {} records",
            self.label,
            self.flushes(),
            self.records()
        );
        Ok(())
    }
}

flb_output_plugin!(CounterPlugin);

#[cfg(test)]
mod tests;
