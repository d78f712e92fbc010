use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LogsiftError, Result};
use crate::model::record::LogRecord;
use crate::model::value::Value;

/// Schema that every destination table lives in.
pub const DEST_SCHEMA: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    ReqLogs,
    DocLogs,
    ReqErrors,
    ReqLogin,
    ReqPathDuration,
    DocErrors,
    DocTime,
    DocLogsDuration,
}

impl TableName {
    /// Write order of a persistence plan.
    pub const ALL: [TableName; 8] = [
        TableName::ReqLogs,
        TableName::DocLogs,
        TableName::ReqErrors,
        TableName::ReqLogin,
        TableName::ReqPathDuration,
        TableName::DocErrors,
        TableName::DocTime,
        TableName::DocLogsDuration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TableName::ReqLogs => "req_logs",
            TableName::DocLogs => "doc_logs",
            TableName::ReqErrors => "req_errors",
            TableName::ReqLogin => "req_login",
            TableName::ReqPathDuration => "req_path_duration",
            TableName::DocErrors => "doc_errors",
            TableName::DocTime => "doc_time",
            TableName::DocLogsDuration => "doc_logs_duration",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = LogsiftError;

    fn from_str(s: &str) -> Result<Self> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LogsiftError::Parse(format!("unknown table: {s}")))
    }
}

/// A typed row of a derived table with a fixed column set.
pub trait TableRow {
    const COLUMNS: &'static [&'static str];

    fn into_cells(self) -> Vec<Value>;
}

/// A named, homogeneous set of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: TableName,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn empty(name: TableName) -> Self {
        Self {
            name,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<R: TableRow>(name: TableName, rows: Vec<R>) -> Self {
        Self {
            name,
            columns: R::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(TableRow::into_cells).collect(),
        }
    }

    /// Builds a table from open-schema records. Columns are the union of record
    /// keys in first-seen order; missing fields become nulls.
    pub fn from_records(name: TableName, records: &[LogRecord]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|r| columns.iter().map(|c| r.cell(c)).collect())
            .collect();

        Self {
            name,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// The eight tables of one run, always in [`TableName::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistencePlan {
    tables: Vec<Table>,
}

impl PersistencePlan {
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Self {
        let mut supplied: Vec<Table> = tables.into_iter().collect();
        let tables = TableName::ALL
            .into_iter()
            .map(|name| {
                supplied
                    .iter()
                    .position(|t| t.name == name)
                    .map(|idx| supplied.swap_remove(idx))
                    .unwrap_or_else(|| Table::empty(name))
            })
            .collect();
        Self { tables }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: TableName) -> &Table {
        &self.tables[name as usize]
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }

    pub fn row_counts(&self) -> RunSummary {
        RunSummary {
            counts: self.tables.iter().map(|t| (t.name, t.len())).collect(),
        }
    }
}

/// Per-table row counts of a committed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub counts: Vec<(TableName, usize)>,
}

impl RunSummary {
    pub fn get(&self, name: TableName) -> Option<usize> {
        self.counts.iter().find(|(t, _)| *t == name).map(|(_, n)| *n)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}
