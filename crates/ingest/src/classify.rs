//! Splits records into request and document families.

use std::collections::HashSet;
use std::sync::OnceLock;

use logsift_core::model::record::LogRecord;
use regex::Regex;
use tracing::info;

use crate::mining::mine_document_message;

const REQUEST_MARKER: &str = "[REQ";
const UNKNOWN_MARKER: &str = "[unknown]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFamily {
    Request,
    Document,
}

impl RecordFamily {
    /// Family of an already-normalized id.
    pub fn of_id(id: &str) -> Self {
        if id.starts_with(REQUEST_MARKER) {
            Self::Request
        } else {
            Self::Document
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub requests: Vec<LogRecord>,
    pub documents: Vec<LogRecord>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.requests.len() + self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn normalize_id(id: &str) -> String {
    id.replace(UNKNOWN_MARKER, "").trim().to_string()
}

/// Partitions records by family and applies the per-family normalization.
pub fn classify(records: impl IntoIterator<Item = LogRecord>) -> Partition {
    let mut partition = Partition::default();
    for mut record in records {
        let id = normalize_id(record.text("id").unwrap_or_default());
        let family = RecordFamily::of_id(&id);
        record.insert("id", id);
        match family {
            RecordFamily::Request => {
                record.rename("id", "req_id");
                template_path(&mut record);
                partition.requests.push(record);
            }
            RecordFamily::Document => {
                record.rename("id", "doc_id");
                partition.documents.push(record);
            }
        }
    }

    compact_sparse_fields(&mut partition.documents);
    partition.documents.iter_mut().for_each(mine_document_message);

    info!(
        requests = partition.requests.len(),
        documents = partition.documents.len(),
        "separated request and document logs"
    );
    partition
}

fn path_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"/api/v1/projects/[a-zA-Z0-9\-]+").expect("project pattern is valid"),
            Regex::new(r"/api/v1/projects/\{project_id\}/invoices/[a-zA-Z0-9\-]+")
                .expect("invoice pattern is valid"),
        )
    })
}

/// Replaces resource ids in `path` with placeholders. The invoice rule only
/// matches after the project rule has run.
pub fn template_path_str(path: &str) -> String {
    let (project, invoice) = path_patterns();
    let projected = project.replace_all(path, "/api/v1/projects/{project_id}");
    invoice
        .replace_all(&projected, "/api/v1/projects/{project_id}/invoices/{invoice_id}")
        .into_owned()
}

fn template_path(record: &mut LogRecord) {
    if let Some(path) = record.text("path") {
        let edited = template_path_str(path);
        record.insert("path_edited", edited);
    }
}

/// Drops fields that carry no value in any document record.
fn compact_sparse_fields(documents: &mut [LogRecord]) {
    let populated: HashSet<String> = documents
        .iter()
        .flat_map(|r| r.iter().filter(|(_, v)| !v.is_null()).map(|(k, _)| k.to_string()))
        .collect();
    for record in documents.iter_mut() {
        record.retain(|k, _| populated.contains(k));
    }
}
