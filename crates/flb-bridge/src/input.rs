use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use flb_bridge_core::{EventTime, Record};

use crate::error::{HarnessError, Result};

/// Reads one JSON object per line. Blank lines are skipped; every record is
/// stamped with `time`.
pub fn parse_json_lines(data: &str, path: &Path, time: EventTime) -> Result<Vec<Record>> {
    let input_error = |line: usize, message: String| HarnessError::Input {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut records = Vec::new();
    for (i, line) in data.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let json: serde_json::Value = serde_json::from_str(line).map_err(|e| input_error(line_no, e.to_string()))?;
        if !json.is_object() {
            return Err(input_error(line_no, "record must be a JSON object".to_string()));
        }
        let body = rmpv::ext::to_value(&json).map_err(|e| input_error(line_no, e.to_string()))?;
        records.push(Record::new(time, body));
    }
    Ok(records)
}

pub fn read_json_lines(path: &Path) -> Result<Vec<Record>> {
    let data = fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json_lines(&data, path, now())
}

fn now() -> EventTime {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    EventTime::new(elapsed.as_secs() as i64, elapsed.subsec_nanos())
}
