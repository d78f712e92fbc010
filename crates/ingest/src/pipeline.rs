use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use logsift_core::error::{LogsiftError, Result};
use logsift_core::model::table::{PersistencePlan, RunSummary, Table, TableName};
use logsift_store::Store;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::classify::classify;
use crate::derive::derive_all;
use crate::notify::{Notifier, RunReport};
use crate::tokenize::tokenize;

/// Reads a raw line file, transparently gunzipping `*.gz` inputs.
pub fn read_raw_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| LogsiftError::Io(format!("failed to open {}: {e}", path.display())))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut lines = Vec::new();
    for (idx, chunk) in BufReader::new(reader).split(b'\n').enumerate() {
        let mut bytes = chunk
            .map_err(|e| LogsiftError::Io(format!("failed to read {}: {e}", path.display())))?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(line) => lines.push(line),
            Err(e) => warn!(line = idx + 1, error = %e, "skipping line that is not valid UTF-8"),
        }
    }
    Ok(lines)
}

/// Tokenizes, classifies and derives the eight tables of one batch.
pub fn build_plan<I, S>(lines: I) -> PersistencePlan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let records: Vec<_> = tokenize(lines).collect();
    info!(records = records.len(), "structured log lines");
    let partition = classify(records);

    let mut tables = vec![
        Table::from_records(TableName::ReqLogs, &partition.requests),
        Table::from_records(TableName::DocLogs, &partition.documents),
    ];
    tables.extend(derive_all(&partition));
    PersistencePlan::new(tables)
}

/// Builds the plan for a file without touching the store.
pub fn plan_file(path: &Path) -> Result<PersistencePlan> {
    let lines = read_raw_lines(path)?;
    Ok(build_plan(lines))
}

/// Parses `path` and persists the result. `None` means nothing was saved,
/// either because the batch was empty or because the write was rolled back.
pub fn process_file(store: &Store, path: &Path) -> Option<RunSummary> {
    let lines = match read_raw_lines(path) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(error = %e, "no raw lines available");
            return None;
        }
    };
    if lines.is_empty() {
        info!(path = %path.display(), "no logs to process");
        return None;
    }

    let plan = build_plan(&lines);
    if plan.total_rows() == 0 {
        info!(path = %path.display(), lines = lines.len(), "no structured logs in batch");
        return None;
    }

    match store.save_plan(&plan) {
        Ok(summary) => {
            info!(rows = summary.total(), "run persisted");
            Some(summary)
        }
        Err(e) => {
            error!(error = %e, "persisting run failed; nothing was saved");
            None
        }
    }
}

/// Processes one raw file and always reports the outcome to `notifier`.
pub async fn process_and_notify(
    store: &Store,
    path: &Path,
    notifier: &Notifier,
    subject: &str,
) -> (Uuid, Option<RunSummary>) {
    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id, path = %path.display());

    let summary = span.in_scope(|| process_file(store, path));
    let report = RunReport::new(run_id, subject, summary.as_ref());
    notifier.notify(&report).instrument(span).await;
    (run_id, summary)
}
