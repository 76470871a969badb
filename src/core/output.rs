//! CLI rendering: the JSON envelope and single-line terminal previews.

use crate::core::time;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1";

/// Body printed by every `--format json` command. The payload's keys sit
/// next to the fixed ones.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub version: &'static str,
    pub cmd: &'a str,
    pub status: &'a str,
    pub event_id: String,
    pub ts_ms: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl<'a> Envelope<'a> {
    pub fn new(cmd: &'a str, status: &'a str, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("data".to_string(), other)]),
        };
        Self {
            version: ENVELOPE_VERSION,
            cmd,
            status,
            event_id: Ulid::new().to_string(),
            ts_ms: time::now_millis(),
            payload,
        }
    }
}

impl fmt::Display for Envelope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// `text` on one line, at most `width` characters, ending in `…` when cut.
pub fn preview(text: &str, width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= width {
        return flat;
    }
    let mut out: String = flat.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// `page 2/5` style indicator.
pub fn page_indicator(current: usize, total: usize) -> String {
    format!("page {}/{}", current, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preview_flattens_and_cuts_to_width() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview("abcdefgh", 4), "abc…");
        assert_eq!(preview("abcd", 4), "abcd");
        assert_eq!(preview("abc", 0), "…");
    }

    #[test]
    fn envelope_merges_payload_keys() {
        let envelope = Envelope::new("archive", "ok", json!({"report_id": 4, "transition": "applied"}));
        let value: Value = serde_json::from_str(&envelope.to_string()).unwrap();
        assert_eq!(value["cmd"], "archive");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["version"], ENVELOPE_VERSION);
        assert_eq!(value["report_id"], 4);
        assert!(Ulid::from_string(value["event_id"].as_str().unwrap()).is_ok());
        assert!(value["ts_ms"].as_i64().unwrap() > 0);
    }

    #[test]
    fn non_object_payload_is_nested() {
        let envelope = Envelope::new("stats", "ok", json!([1, 2]));
        assert_eq!(envelope.payload["data"], json!([1, 2]));
        assert!(Envelope::new("migrate", "ok", Value::Null).payload.is_empty());
    }

    #[test]
    fn page_indicator_format() {
        assert_eq!(page_indicator(1, 1), "page 1/1");
    }
}
