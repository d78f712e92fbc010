use chrono::NaiveDateTime;
use logsift_core::model::record::LogRecord;
use logsift_core::model::table::{Table, TableName, TableRow};
use logsift_core::model::value::Value;

use super::{FirstValueIndex, is_error_level};

const ID: &str = "doc_id";

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentErrorRow {
    pub timestamp: Option<NaiveDateTime>,
    pub doc_id: Option<String>,
    pub level: Option<String>,
    pub msg: Option<String>,
}

impl TableRow for DocumentErrorRow {
    const COLUMNS: &'static [&'static str] = &["timestamp", "doc_id", "level", "msg"];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.timestamp.into(),
            self.doc_id.into(),
            self.level.into(),
            self.msg.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTimeRow {
    pub doc_id: Option<String>,
    pub process_invoice_finished_time: f64,
    pub number_of_invoices_created: Value,
    pub timestamp: Option<NaiveDateTime>,
}

impl TableRow for DocumentTimeRow {
    const COLUMNS: &'static [&'static str] = &[
        "doc_id",
        "process_invoice_finished_time",
        "number_of_invoices_created",
        "timestamp",
    ];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.doc_id.into(),
            self.process_invoice_finished_time.into(),
            self.number_of_invoices_created,
            self.timestamp.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDurationRow {
    pub timestamp: Option<NaiveDateTime>,
    pub msg: Option<String>,
    pub doc_id: Option<String>,
    pub duration: f64,
}

impl TableRow for DocumentDurationRow {
    const COLUMNS: &'static [&'static str] = &["timestamp", "msg", "doc_id", "duration"];

    fn into_cells(self) -> Vec<Value> {
        vec![
            self.timestamp.into(),
            self.msg.into(),
            self.doc_id.into(),
            self.duration.into(),
        ]
    }
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

pub fn errors(records: &[LogRecord]) -> Table {
    let rows = records
        .iter()
        .filter(|r| is_error_level(r))
        .map(|r| DocumentErrorRow {
            timestamp: r.timestamp(),
            doc_id: owned(r.text(ID)),
            level: owned(r.text("level")),
            msg: owned(
                r.text("error_message")
                    .or_else(|| r.text("error_detail"))
                    .or_else(|| r.text("msg")),
            ),
        })
        .collect();
    Table::from_rows(TableName::DocErrors, rows)
}

/// Finish-time rows joined with the invoice count logged for the same document.
pub fn times(records: &[LogRecord]) -> Table {
    let counts = FirstValueIndex::build(records, ID, "number_of_invoices_created");
    let rows = records
        .iter()
        .filter_map(|r| {
            let finished = r.float("process_invoice_finished_time")?;
            let doc_id = r.text(ID);
            Some(DocumentTimeRow {
                doc_id: owned(doc_id),
                process_invoice_finished_time: finished,
                number_of_invoices_created: doc_id
                    .and_then(|id| counts.get(id))
                    .cloned()
                    .unwrap_or(Value::Null),
                timestamp: r.timestamp(),
            })
        })
        .collect();
    Table::from_rows(TableName::DocTime, rows)
}

/// Rows with a duration, grouped by message in first-appearance order.
pub fn durations(records: &[LogRecord]) -> Table {
    let mut groups: Vec<(Option<&str>, Vec<DocumentDurationRow>)> = Vec::new();
    for r in records {
        let Some(duration) = r.float("duration") else {
            continue;
        };
        let msg = r.text("msg");
        let row = DocumentDurationRow {
            timestamp: r.timestamp(),
            msg: owned(msg),
            doc_id: owned(r.text(ID)),
            duration,
        };
        match groups.iter_mut().find(|(m, _)| *m == msg) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((msg, vec![row])),
        }
    }
    let rows = groups.into_iter().flat_map(|(_, rows)| rows).collect();
    Table::from_rows(TableName::DocLogsDuration, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, level: &str, fields: &[(&str, Value)]) -> LogRecord {
        let mut r: LogRecord = [("doc_id", id), ("level", level)].into_iter().collect();
        for (k, v) in fields {
            r.insert(*k, v.clone());
        }
        r
    }

    #[test]
    fn error_message_falls_back_to_msg() {
        let records = vec![
            rec("D1", "ERROR", &[("error_detail", Value::text("detail")), ("msg", Value::text("m"))]),
            rec("D2", "WARNING", &[("msg", Value::text("only msg"))]),
            rec("D3", "INFO", &[("error_message", Value::text("ignored"))]),
        ];
        let table = errors(&records);
        assert_eq!(
            table.column("msg").unwrap(),
            vec![&Value::text("detail"), &Value::text("only msg")]
        );
    }

    #[test]
    fn finish_time_picks_up_invoice_count_from_other_line() {
        let records = vec![
            rec("D1", "INFO", &[("process_invoice_finished_time", Value::Float(3.5))]),
            rec("D1", "INFO", &[("number_of_invoices_created", Value::Int(4))]),
            rec("D2", "INFO", &[("process_invoice_finished_time", Value::Float(1.0))]),
        ];
        let table = times(&records);
        assert_eq!(
            table.column("number_of_invoices_created").unwrap(),
            vec![&Value::Int(4), &Value::Null]
        );
        assert_eq!(
            table.column("process_invoice_finished_time").unwrap(),
            vec![&Value::Float(3.5), &Value::Float(1.0)]
        );
    }

    #[test]
    fn durations_group_by_message() {
        let records = vec![
            rec("D1", "INFO", &[("msg", Value::text("ocr")), ("duration", Value::Float(1.0))]),
            rec("D1", "INFO", &[("msg", Value::text("llm")), ("duration", Value::Float(2.0))]),
            rec("D2", "INFO", &[("msg", Value::text("ocr")), ("duration", Value::Float(3.0))]),
            rec("D2", "INFO", &[("msg", Value::text("ocr")), ("duration", Value::Null)]),
            rec("D3", "INFO", &[("duration", Value::Float(4.0))]),
        ];
        let table = durations(&records);
        assert_eq!(
            table.column("duration").unwrap(),
            vec![
                &Value::Float(1.0),
                &Value::Float(3.0),
                &Value::Float(2.0),
                &Value::Float(4.0)
            ]
        );
        assert_eq!(table.column("msg").unwrap()[3], &Value::Null);
    }
}
