use chrono::NaiveDateTime;
use logsift_core::model::record::LogRecord;
use logsift_core::model::table::{Table, TableName, TableRow};
use logsift_core::model::value::Value;
use tracing::debug;

use super::{FirstValueIndex, group_by_id, is_error_level};

const ID: &str = "req_id";

#[derive(Debug, Clone, PartialEq)]
pub struct RequestErrorRow {
    pub timestamp: Option<NaiveDateTime>,
    pub req_id: String,
    pub level: Option<String>,
    pub error_detail: Option<String>,
    pub status_code: String,
}

impl TableRow for RequestErrorRow {
    const COLUMNS: &'static [&'static str] =
        &["timestamp", "req_id", "level", "error_detail", "status_code"];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.timestamp.into(),
            self.req_id.into(),
            self.level.into(),
            self.error_detail.into(),
            self.status_code.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginRow {
    pub timestamp: Option<NaiveDateTime>,
    pub req_id: String,
    pub login: String,
    pub duration: f64,
    pub status_code: String,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub ip: Option<String>,
}

impl TableRow for LoginRow {
    const COLUMNS: &'static [&'static str] = &[
        "timestamp",
        "req_id",
        "login",
        "duration",
        "status_code",
        "error_message",
        "error_detail",
        "ip",
    ];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.timestamp.into(),
            self.req_id.into(),
            self.login.into(),
            self.duration.into(),
            self.status_code.into(),
            self.error_message.into(),
            self.error_detail.into(),
            self.ip.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathDurationRow {
    pub method: Option<String>,
    pub path_edited: Option<String>,
    pub duration_s: f64,
    pub req_id: Option<String>,
    pub status_code: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

impl TableRow for PathDurationRow {
    const COLUMNS: &'static [&'static str] = &[
        "method",
        "path_edited",
        "duration_s",
        "req_id",
        "status_code",
        "timestamp",
    ];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.method.into(),
            self.path_edited.into(),
            self.duration_s.into(),
            self.req_id.into(),
            self.status_code.into(),
            self.timestamp.into(),
        ]
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

/// First non-INFO row per request, with its status code looked up across
/// every row of the same request.
pub fn errors(records: &[LogRecord]) -> Table {
    let has_error_fields = records
        .iter()
        .any(|r| r.contains("error_detail") || r.contains("error_message"));
    if !has_error_fields {
        debug!("no error fields in request logs");
        return Table::from_rows::<RequestErrorRow>(TableName::ReqErrors, Vec::new());
    }

    let status = FirstValueIndex::build(records, ID, "status_code");
    let mut seen = std::collections::HashSet::new();
    let rows = records
        .iter()
        .filter(|r| is_error_level(r))
        .filter_map(|r| {
            let id = r.text(ID)?;
            if !seen.insert(id) {
                return None;
            }
            Some(RequestErrorRow {
                timestamp: r.timestamp(),
                req_id: id.to_string(),
                level: owned(r.text("level")),
                error_detail: owned(r.text("error_detail").or_else(|| r.text("error_message"))),
                status_code: status
                    .get(id)
                    .map(Value::to_string)
                    .unwrap_or_default(),
            })
        })
        .collect();
    Table::from_rows(TableName::ReqErrors, rows)
}

/// One row per request that carries a login, a duration and a status code.
pub fn logins(records: &[LogRecord]) -> Table {
    let rows = group_by_id(records, ID)
        .into_iter()
        .filter_map(|(id, rows)| {
            let first_text = |field: &str| rows.iter().find_map(|r| r.text(field));
            let login = first_text("login")?;
            let duration = rows.iter().find_map(|r| r.float("duration_s"))?;
            let status_code = rows
                .iter()
                .find_map(|r| r.get("status_code"))
                .map(Value::to_string)?;
            Some(LoginRow {
                timestamp: rows.first().and_then(|r| r.timestamp()),
                req_id: id.to_string(),
                login: login.to_string(),
                duration,
                status_code,
                error_message: owned(first_text("error_message")),
                error_detail: owned(first_text("error_detail")),
                ip: owned(first_text("ip")),
            })
        })
        .collect();
    Table::from_rows(TableName::ReqLogin, rows)
}

pub fn path_durations(records: &[LogRecord]) -> Table {
    let rows = records
        .iter()
        .filter_map(|r| {
            Some(PathDurationRow {
                duration_s: r.float("duration_s")?,
                method: owned(r.text("method")),
                path_edited: owned(r.text("path_edited")),
                req_id: owned(r.text(ID)),
                status_code: r.get("status_code").map(Value::to_string),
                timestamp: r.timestamp(),
            })
        })
        .collect();
    Table::from_rows(TableName::ReqPathDuration, rows)
}
