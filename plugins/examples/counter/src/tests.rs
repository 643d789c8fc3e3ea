use flb_bridge_core::{Bridge, EventTime, FlbResult, FlushBuffer, MapConfig, Record, encode_records};
use rmpv::Value;

use super::CounterPlugin;

fn batch(n: usize) -> Vec<u8> {
    let records: Vec<Record> = (0..n)
        .map(|i| Record::new(EventTime::new(1, 0), Value::Map(vec![(Value::from("i"), Value::from(i as u64))])))
        .collect();
    encode_records(&records).unwrap()
}

#[test]
fn test_counts_flushes_and_records() {
    let bridge: Bridge<CounterPlugin> = Bridge::new(CounterPlugin::default);
    bridge.register().unwrap();
    let handle = bridge.create_instance().unwrap();
    bridge.init_instance(handle, &MapConfig::new().with("label", "t")).unwrap();

    for n in [3, 0, 2] {
        let data = batch(n);
        bridge.flush(handle, &FlushBuffer::new(&data, "count.me")).unwrap();
    }
    // The empty batch never reaches the plugin
    assert_eq!(bridge.flush_count(handle), Some(2));
    bridge.exit(handle).unwrap();
}

#[test]
fn test_direct_counters() {
    use flb_bridge_core::{OutputPlugin, PluginConfig};

    let mut plugin = CounterPlugin::default();
    let config = MapConfig::new();
    plugin.plugin_init(&PluginConfig::new(&config)).unwrap();
    assert_eq!(plugin.label, "counter");

    let data = batch(4);
    plugin.plugin_flush(&FlushBuffer::new(&data, "t")).unwrap();
    plugin.plugin_flush(&FlushBuffer::new(&data, "t")).unwrap();
    assert_eq!(plugin.flushes(), 2);
    assert_eq!(plugin.records(), 8);
    assert!(plugin.plugin_exit().is_ok());
}

#[test]
fn test_garbage_batch_is_an_error() {
    let bridge: Bridge<CounterPlugin> = Bridge::new(CounterPlugin::default);
    bridge.register().unwrap();
    let handle = bridge.create_instance().unwrap();
    bridge.init_instance(handle, &MapConfig::new()).unwrap();

    let err = bridge.flush(handle, &FlushBuffer::new(&[0xc1], "t")).unwrap_err();
    assert_eq!(err.result_code(), FlbResult::Error);
    assert_eq!(bridge.flush_count(handle), Some(0));
}
