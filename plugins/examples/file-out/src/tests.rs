use std::io;

use flb_bridge_core::{
    Bridge, BridgeError, EventTime, FlbResult, FlushBuffer, LifecycleState, MapConfig, Record, encode_records,
};
use rmpv::Value;
use tempfile::tempdir;

use super::{FileOutPlugin, io_failure, write_batch};

fn batch(start: u64, n: u64) -> Vec<u8> {
    let records: Vec<Record> = (start..start + n)
        .map(|i| {
            Record::new(
                EventTime::new(1_700_000_000, 500_000_000),
                Value::Map(vec![(Value::from("seq"), Value::from(i))]),
            )
        })
        .collect();
    encode_records(&records).unwrap()
}

fn started(config: &MapConfig) -> (Bridge<FileOutPlugin>, flb_bridge_core::InstanceHandle) {
    let bridge: Bridge<FileOutPlugin> = Bridge::new(FileOutPlugin::default);
    bridge.register().unwrap();
    let handle = bridge.create_instance().unwrap();
    bridge.init_instance(handle, config).unwrap();
    (bridge, handle)
}

#[test]
fn test_json_lines_output() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.json");
    let (bridge, handle) = started(&MapConfig::new().with("path", path.to_str().unwrap()));

    bridge.flush(handle, &FlushBuffer::new(&batch(0, 2), "app")).unwrap();
    bridge.flush(handle, &FlushBuffer::new(&batch(2, 1), "app")).unwrap();
    bridge.exit(handle).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["tag"], "app");
    assert_eq!(lines[0]["time"], 1_700_000_000.5);
    assert_eq!(lines[2]["record"]["seq"], 2);
}

#[test]
fn test_msgpack_output_is_the_raw_batches() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.msgpack");
    let config = MapConfig::new()
        .with("path", path.to_str().unwrap())
        .with("format", "MsgPack");
    let (bridge, handle) = started(&config);

    let first = batch(0, 2);
    let second = batch(2, 3);
    bridge.flush(handle, &FlushBuffer::new(&first, "t")).unwrap();
    bridge.flush(handle, &FlushBuffer::new(&second, "t")).unwrap();
    bridge.exit(handle).unwrap();

    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, [first, second].concat());
    assert_eq!(FlushBuffer::new(&written, "t").records().count(), 5);
}

#[test]
fn test_append_toggle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.json");
    std::fs::write(&path, "previous\n").unwrap();

    let (bridge, handle) = started(&MapConfig::new().with("path", path.to_str().unwrap()));
    bridge.flush(handle, &FlushBuffer::new(&batch(0, 1), "t")).unwrap();
    bridge.exit(handle).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().starts_with("previous\n"));

    let config = MapConfig::new()
        .with("path", path.to_str().unwrap())
        .with("append", "off");
    let (bridge, handle) = started(&config);
    bridge.flush(handle, &FlushBuffer::new(&batch(0, 1), "t")).unwrap();
    bridge.exit(handle).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains("previous"));
    assert_eq!(content.lines().count(), 1);
}

#[test]
fn test_init_failures() {
    let dir = tempdir().unwrap();
    let bridge: Bridge<FileOutPlugin> = Bridge::new(FileOutPlugin::default);
    bridge.register().unwrap();

    let bad_configs = [
        MapConfig::new(),
        MapConfig::new().with("path", dir.path().join("x").to_str().unwrap()).with("format", "csv"),
        MapConfig::new().with("path", dir.path().join("x").to_str().unwrap()).with("append", "maybe"),
        // A directory cannot be opened for writing
        MapConfig::new().with("path", dir.path().to_str().unwrap()),
    ];
    for config in &bad_configs {
        let handle = bridge.create_instance().unwrap();
        let err = bridge.init_instance(handle, config).unwrap_err();
        assert!(matches!(err, BridgeError::Plugin { .. }), "{:?}", err);
        assert_eq!(bridge.state(Some(handle)), Some(LifecycleState::InitFailed));

        let data = batch(0, 1);
        assert!(bridge.flush(handle, &FlushBuffer::new(&data, "t")).is_err());
        bridge.exit(handle).unwrap();
    }
}

#[test]
fn test_corrupt_batch_is_not_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.msgpack");
    let config = MapConfig::new()
        .with("path", path.to_str().unwrap())
        .with("format", "msgpack");
    let (bridge, handle) = started(&config);

    let err = bridge.flush(handle, &FlushBuffer::new(&[0x92, 0x01], "t")).unwrap_err();
    assert_eq!(err.result_code(), FlbResult::Error);
    bridge.exit(handle).unwrap();
    assert!(std::fs::read(&path).unwrap().is_empty());
}

#[test]
fn test_transient_io_errors_ask_for_retry() {
    for kind in [io::ErrorKind::Interrupted, io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut] {
        assert!(io_failure("write", io::Error::from(kind)).is_retry(), "{:?}", kind);
    }
    for kind in [io::ErrorKind::PermissionDenied, io::ErrorKind::NotFound, io::ErrorKind::Other] {
        assert!(!io_failure("write", io::Error::from(kind)).is_retry(), "{:?}", kind);
    }
}

/// Accepts `capacity` bytes, at most `chunk` per call, then fails with `kind`.
struct ChokingWriter {
    out: Vec<u8>,
    capacity: usize,
    chunk: usize,
    kind: io::ErrorKind,
}

impl ChokingWriter {
    fn new(capacity: usize, kind: io::ErrorKind) -> Self {
        Self {
            out: Vec::new(),
            capacity,
            chunk: 4,
            kind,
        }
    }
}

impl io::Write for ChokingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.capacity - self.out.len();
        if room == 0 {
            return Err(io::Error::from(self.kind));
        }
        let n = buf.len().min(room).min(self.chunk);
        self.out.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_partial_write_is_not_retried() {
    let data = batch(0, 3);

    let mut untouched = ChokingWriter::new(0, io::ErrorKind::WouldBlock);
    let err = write_batch(&mut untouched, &data).unwrap_err();
    assert!(err.is_retry());
    assert!(untouched.out.is_empty());

    for kind in [io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut] {
        let mut partial = ChokingWriter::new(10, kind);
        let err = write_batch(&mut partial, &data).unwrap_err();
        assert!(!err.is_retry(), "{:?}", kind);
        assert_eq!(partial.out, data[..10]);
    }

    let mut roomy = ChokingWriter::new(data.len(), io::ErrorKind::Other);
    write_batch(&mut roomy, &data).unwrap();
    assert_eq!(roomy.out, data);
}
