//! Raw line -> [`LogRecord`].
//!
//! A raw line is a transport envelope (`{"log": "..."}` as JSON or as a
//! Python literal). The `log` text is cleaned of container stream prefixes and
//! matched against the application log layout:
//!
//! ```text
//! 2024-05-01 10:00:00 - api.routes - INFO - [REQ_<hex>] path: /x | status code: 200
//! ```
//!
//! Lines that fail to decode are logged and skipped; lines that decode but do
//! not follow the layout are skipped quietly since many emissions are not
//! structured entries at all.

pub mod literal;

use std::sync::OnceLock;

use logsift_core::model::record::LogRecord;
use logsift_core::model::value::Value;
use logsift_core::time::parse_log_timestamp;
use regex::Regex;
use tracing::{debug, warn};

const STREAM_PREFIXES: [&str; 2] = ["stdout F ", "stderr F "];
/// Keys a leading `key: value` segment may set. Other heads are prose and stay in `msg`.
const HEAD_FIELD_KEYS: [&str; 9] = [
    "method",
    "path",
    "status_code",
    "duration",
    "duration_(s)",
    "login",
    "ip",
    "error_message",
    "error_detail",
];

fn log_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) - ",
            r"([\w\.\-]+) - ",
            r"(\w+) - ",
            r"(\[unknown\] \[DOC_[a-f0-9\-]+\]|\[DOC_[a-f0-9\-]+\]|\[REQ_[a-f0-9\-]+\] \[unknown\]|\[REQ_[a-f0-9\-]+\]) ",
            r"(.+)",
        ))
        .expect("log pattern is valid")
    })
}

/// Lazily turns raw envelope lines into records, dropping what cannot be parsed.
pub fn tokenize<I, S>(lines: I) -> impl Iterator<Item = LogRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| extract_log_text(line.as_ref()))
        .filter_map(|text| structure_line(&text))
}

/// Pulls the cleaned `log` text out of one envelope line.
pub fn extract_log_text(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let decoded = match serde_json::from_str::<serde_json::Value>(line) {
        Ok(v) => v,
        Err(json_err) => match literal::parse_literal(line) {
            Ok(v) => v,
            Err(literal_err) => {
                warn!(
                    json_error = %json_err,
                    literal_error = %literal_err,
                    line = %truncate(line, 200),
                    "failed to decode log envelope"
                );
                return None;
            }
        },
    };

    let Some(text) = decoded.get("log").and_then(serde_json::Value::as_str) else {
        warn!(line = %truncate(line, 200), "log envelope has no 'log' text field");
        return None;
    };

    let mut cleaned = text.to_string();
    for prefix in STREAM_PREFIXES {
        cleaned = cleaned.replace(prefix, "");
    }
    Some(cleaned)
}

/// Matches cleaned log text against the layout and builds a finalized record.
pub fn structure_line(text: &str) -> Option<LogRecord> {
    let Some(caps) = log_pattern().captures(text) else {
        debug!(text = %truncate(text, 200), "line does not follow log layout");
        return None;
    };

    let mut record = LogRecord::new();
    record.insert("timestamp", &caps[1]);
    record.insert("module", &caps[2]);
    record.insert("level", &caps[3]);
    record.insert("id", &caps[4]);

    let mut parts = caps[5].split(" | ");
    let head = parts.next().unwrap_or_default();
    record.insert("msg", head);
    if let Some((key, value)) = head.split_once(": ") {
        let key = normalize_key(key);
        if HEAD_FIELD_KEYS.contains(&key.as_str()) {
            record.insert(key, value.trim());
        }
    }
    for part in parts {
        if let Some((key, value)) = part.split_once(": ") {
            record.insert(normalize_key(key), value.trim());
        }
    }

    finalize(&mut record);
    Some(record)
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace(' ', "_")
}

fn finalize(record: &mut LogRecord) {
    let ts = record
        .text("timestamp")
        .and_then(parse_log_timestamp)
        .map(Value::Timestamp)
        .unwrap_or(Value::Null);
    record.insert("timestamp", ts);

    record.rename("duration_(s)", "duration_s");

    let duration_keys: Vec<String> = record
        .keys()
        .filter(|k| is_duration_key(k))
        .map(str::to_string)
        .collect();
    for key in duration_keys {
        let numeric = record.cell(&key).to_numeric();
        record.insert(key, numeric);
    }
}

fn is_duration_key(key: &str) -> bool {
    key == "duration" || key == "duration_s" || key.ends_with("_duration")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
