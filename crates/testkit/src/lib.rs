use std::path::{Path, PathBuf};

/// Number of structured records in [`mixed_batch`].
pub const MIXED_BATCH_RECORDS: usize = 9;

/// Wraps log text the way the container runtime ships it.
pub fn envelope(text: &str) -> String {
    serde_json::json!({ "log": format!("stdout F {text}"), "stream": "stdout" }).to_string()
}

/// Same envelope rendered as a Python literal, as older collectors wrote it.
pub fn literal_envelope(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{'log': 'stderr F {escaped}', 'stream': 'stderr', 'partial': False}}")
}

/// Two requests and one document, plus lines that must be dropped.
///
/// - `[REQ_a1]` logs in successfully (status 200, 0.25 s).
/// - `[REQ_b2]` fails; its status code 500 arrives on a later line.
/// - `[DOC_c3]` creates 4 invoices, finishes in 12.5 s, reports token
///   usage, and hits one OCR error.
pub fn mixed_batch() -> Vec<String> {
    vec![
        envelope(
            "2024-05-01 10:00:00 - api.routes - INFO - [REQ_a1] [unknown] path: /api/v1/projects/p1/invoices/i9 | method: GET | login: alice | ip: 10.0.0.1",
        ),
        literal_envelope(
            "2024-05-01 10:00:01 - api.routes - INFO - [REQ_a1] request finished | duration (s): 0.25 | status code: 200",
        ),
        envelope(
            "2024-05-01 10:00:02 - api.routes - ERROR - [REQ_b2] path: /api/v1/projects/p2 | method: POST | error message: db timeout",
        ),
        envelope(
            "2024-05-01 10:00:03 - api.routes - INFO - [REQ_b2] request finished | duration (s): 1.5 | status code: 500",
        ),
        envelope("INFO:     Uvicorn running on http://0.0.0.0:8000"),
        "{broken envelope".to_string(),
        envelope(
            "2024-05-01 10:01:00 - worker.ocr - INFO - [unknown] [DOC_c3] msg: Number of invoices created - 4",
        ),
        envelope(
            "2024-05-01 10:01:05 - worker.ocr - INFO - [DOC_c3] msg: PROCESS invoice finished in 12.5 seconds",
        ),
        envelope("2024-05-01 10:01:06 - worker.llm - INFO - [DOC_c3] LLM call | duration: 2.0"),
        envelope(
            "2024-05-01 10:01:07 - worker.llm - INFO - [DOC_c3] Input tokens 1200, Output tokens 300",
        ),
        envelope(
            "2024-05-01 10:01:08 - worker.ocr - ERROR - [DOC_c3] OCR failed | error message: unreadable page | duration: 0.5",
        ),
    ]
}

/// Writes `lines` to `dir/name`, one per line.
pub fn write_raw_file(dir: &Path, name: &str, lines: &[String]) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&path, body)?;
    Ok(path)
}
