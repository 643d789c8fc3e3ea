//! # Flush Buffers and Records
//!
//! The host flushes a batch as a run of concatenated MessagePack events.
//! Each event is `[timestamp, body]`, or `[[timestamp, metadata], body]` for
//! hosts that attach per-record metadata. Timestamps are plain integers,
//! floats, or the EventTime extension (type 0: seconds and nanoseconds as two
//! big-endian `u32`).
use rmpv::Value;
use serde::Serialize;

use crate::plugin_system::error::RecordError;

/// MessagePack extension type the host uses for timestamps.
pub const EVENT_TIME_EXT: i8 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventTime {
    pub seconds: i64,
    pub nanos: u32,
}

impl EventTime {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.nanos) / 1e9
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => i.as_i64().map(|s| Self::new(s, 0)),
            Value::F64(f) => Some(Self::from_float(*f)),
            Value::F32(f) => Some(Self::from_float(f64::from(*f))),
            Value::Ext(EVENT_TIME_EXT, data) => {
                let &[s0, s1, s2, s3, n0, n1, n2, n3] = data.as_slice() else {
                    return None;
                };
                Some(Self::new(
                    i64::from(u32::from_be_bytes([s0, s1, s2, s3])),
                    u32::from_be_bytes([n0, n1, n2, n3]),
                ))
            }
            _ => None,
        }
    }

    /// `nanos` always ends up in `0..1_000_000_000`; negative times floor
    /// toward the earlier second.
    fn from_float(f: f64) -> Self {
        let mut seconds = f.floor();
        let mut nanos = ((f - seconds) * 1e9).round();
        if nanos >= 1e9 {
            seconds += 1.0;
            nanos = 0.0;
        }
        Self::new(seconds as i64, nanos as u32)
    }

    fn to_value(self) -> Value {
        match u32::try_from(self.seconds) {
            Ok(seconds) => {
                let mut data = Vec::with_capacity(8);
                data.extend_from_slice(&seconds.to_be_bytes());
                data.extend_from_slice(&self.nanos.to_be_bytes());
                Value::Ext(EVENT_TIME_EXT, data)
            }
            // Outside the extension's range; fall back to integer seconds.
            Err(_) => Value::from(self.seconds),
        }
    }
}

/// One decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: EventTime,
    pub metadata: Option<Value>,
    pub body: Value,
}

impl Record {
    pub fn new(time: EventTime, body: Value) -> Self {
        Self {
            time,
            metadata: None,
            body,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The body as a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.body)
    }

    fn from_value(index: usize, value: Value) -> Result<Self, RecordError> {
        let malformed = |message: &str| RecordError::Malformed {
            index,
            message: message.to_string(),
        };
        let Value::Array(mut items) = value else {
            return Err(malformed("event is not an array"));
        };
        if items.len() != 2 {
            return Err(malformed("event must have exactly two elements"));
        }
        let body = items.pop().unwrap_or(Value::Nil);
        let header = items.pop().unwrap_or(Value::Nil);
        if !matches!(body, Value::Map(_)) {
            return Err(malformed("record body is not a map"));
        }

        let (time_value, metadata) = match header {
            Value::Array(mut parts) if parts.len() == 2 => {
                let metadata = parts.pop();
                (parts.pop().unwrap_or(Value::Nil), metadata)
            }
            other => (other, None),
        };
        let time = EventTime::from_value(&time_value).ok_or_else(|| malformed("unsupported timestamp"))?;

        Ok(Self { time, metadata, body })
    }

    fn to_value(&self) -> Value {
        let header = match &self.metadata {
            Some(metadata) => Value::Array(vec![self.time.to_value(), metadata.clone()]),
            None => self.time.to_value(),
        };
        Value::Array(vec![header, self.body.clone()])
    }
}

/// A borrowed batch of records, valid for the duration of one flush call.
#[derive(Debug, Clone, Copy)]
pub struct FlushBuffer<'a> {
    data: &'a [u8],
    tag: &'a str,
}

impl<'a> FlushBuffer<'a> {
    pub fn new(data: &'a [u8], tag: &'a str) -> Self {
        Self { data, tag }
    }

    /// The raw MessagePack bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Tag of the records in this batch.
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn records(&self) -> Records<'a> {
        Records {
            remaining: self.data,
            index: 0,
            failed: false,
        }
    }
}

/// Iterator over the events of a [`FlushBuffer`]. Stops after the first error.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    remaining: &'a [u8],
    index: usize,
    failed: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let mut cursor = self.remaining;
        let decoded = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| RecordError::Decode {
                index,
                message: e.to_string(),
            })
            .and_then(|value| Record::from_value(index, value));
        self.remaining = cursor;
        if decoded.is_err() {
            self.failed = true;
        }
        Some(decoded)
    }
}

/// Encodes records in the layout the host flushes.
pub fn encode_records(records: &[Record]) -> Result<Vec<u8>, RecordError> {
    let mut buf = Vec::new();
    for (index, record) in records.iter().enumerate() {
        rmpv::encode::write_value(&mut buf, &record.to_value()).map_err(|e| RecordError::Encode {
            index,
            message: e.to_string(),
        })?;
    }
    Ok(buf)
}
