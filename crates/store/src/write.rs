use duckdb::types::{TimeUnit, Value as SqlValue};
use duckdb::{Connection, params, params_from_iter};
use logsift_core::error::{LogsiftError, Result};
use logsift_core::model::table::{DEST_SCHEMA, PersistencePlan, RunSummary, Table};
use logsift_core::model::value::Value;
use tracing::{info, warn};

use crate::Store;

impl Store {
    /// Writes every non-empty table of the plan inside one transaction.
    ///
    /// Either all tables land and the per-table counts are returned, or the
    /// transaction is rolled back and nothing is written.
    pub fn save_plan(&self, plan: &PersistencePlan) -> Result<RunSummary> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| LogsiftError::Store(format!("begin tx failed: {e}")))?;

        match write_tables(&tx, plan) {
            Ok(summary) => {
                tx.commit()
                    .map_err(|e| LogsiftError::Store(format!("commit plan failed: {e}")))?;
                info!(rows = summary.total(), "saved all tables in one transaction");
                Ok(summary)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = ?rollback_err, "rollback after failed save also failed");
                }
                Err(err)
            }
        }
    }
}

fn write_tables(conn: &Connection, plan: &PersistencePlan) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for table in plan.tables() {
        if table.is_empty() {
            info!(table = %table.name, "no rows to save");
            summary.counts.push((table.name, 0));
            continue;
        }
        info!(table = %table.name, rows = table.len(), "saving rows");
        let written = insert_table(conn, table)?;
        summary.counts.push((table.name, written));
    }
    Ok(summary)
}

fn insert_table(conn: &Connection, table: &Table) -> Result<usize> {
    let dest_columns = destination_columns(conn, DEST_SCHEMA, table.name.as_str())?;
    let reconciled = reconcile_columns(&table.columns, &dest_columns);
    if reconciled.keep.is_empty() {
        return Err(LogsiftError::Store(format!(
            "no matching columns between table and {DEST_SCHEMA}.{}",
            table.name
        )));
    }
    if !reconciled.dropped.is_empty() {
        warn!(
            table = %table.name,
            dropped = ?reconciled.dropped,
            "dropping columns missing from destination"
        );
    }

    let column_list = reconciled
        .keep
        .iter()
        .map(|&idx| quote_ident(&table.columns[idx]))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; reconciled.keep.len()].join(", ");
    let sql = format!(
        "INSERT INTO {}.{} ({column_list}) VALUES ({placeholders})",
        quote_ident(DEST_SCHEMA),
        quote_ident(table.name.as_str())
    );

    let mut stmt = conn.prepare(&sql).map_err(|e| {
        LogsiftError::Store(format!("prepare insert {} failed: {e}", table.name))
    })?;
    for row in &table.rows {
        let cells = reconciled.keep.iter().map(|&idx| to_sql_value(&row[idx]));
        stmt.execute(params_from_iter(cells))
            .map_err(|e| LogsiftError::Store(format!("insert into {} failed: {e}", table.name)))?;
    }

    Ok(table.rows.len())
}

fn destination_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = ? AND table_name = ?
             ORDER BY ordinal_position",
        )
        .map_err(|e| LogsiftError::Store(format!("prepare column lookup failed: {e}")))?;
    let rows = stmt
        .query_map(params![schema, table], |row| row.get::<_, String>(0))
        .map_err(|e| LogsiftError::Store(format!("column lookup failed: {e}")))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| LogsiftError::Store(format!("map column row failed: {e}")))?);
    }
    Ok(out)
}

#[derive(Debug, PartialEq, Eq)]
struct Reconciled {
    /// Indexes into the table's columns, in table order.
    keep: Vec<usize>,
    dropped: Vec<String>,
}

fn reconcile_columns(table_columns: &[String], dest_columns: &[String]) -> Reconciled {
    let mut keep = Vec::new();
    let mut dropped = Vec::new();
    for (idx, column) in table_columns.iter().enumerate() {
        if dest_columns.iter().any(|d| d == column) {
            keep.push(idx);
        } else {
            dropped.push(column.clone());
        }
    }
    Reconciled { keep, dropped }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(i) => SqlValue::BigInt(*i),
        Value::Float(f) if f.is_nan() => SqlValue::Null,
        Value::Float(f) => SqlValue::Double(*f),
        Value::Timestamp(ts) => {
            SqlValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
        // Stringified nulls leak in from upstream emitters.
        Value::Text(s) if s == "None" => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use logsift_core::model::table::TableName;

    use super::*;

    fn ts(s: &str) -> Value {
        Value::Timestamp(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    fn table(name: TableName, columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    fn full_plan() -> PersistencePlan {
        let t = ts("2024-05-01 10:00:00");
        PersistencePlan::new(vec![
            table(
                TableName::ReqLogs,
                &["timestamp", "req_id", "level", "msg"],
                vec![vec![t.clone(), "[REQ_a]".into(), "INFO".into(), "hello".into()]],
            ),
            table(
                TableName::DocLogs,
                &["timestamp", "doc_id", "level", "msg"],
                vec![vec![t.clone(), "[DOC_b]".into(), "INFO".into(), "doc".into()]],
            ),
            table(
                TableName::ReqErrors,
                &["timestamp", "req_id", "level", "error_detail", "status_code"],
                vec![vec![
                    t.clone(),
                    "[REQ_a]".into(),
                    "ERROR".into(),
                    "boom".into(),
                    "500".into(),
                ]],
            ),
            table(
                TableName::ReqLogin,
                &["timestamp", "req_id", "login", "duration", "status_code"],
                vec![vec![
                    t.clone(),
                    "[REQ_a]".into(),
                    "user@example.com".into(),
                    Value::Float(0.2),
                    "200".into(),
                ]],
            ),
            table(
                TableName::ReqPathDuration,
                &["method", "path_edited", "duration_s", "req_id", "status_code", "timestamp"],
                vec![vec![
                    "GET".into(),
                    "/api/v1/projects/{project_id}".into(),
                    Value::Float(0.42),
                    "[REQ_a]".into(),
                    "200".into(),
                    t.clone(),
                ]],
            ),
            table(
                TableName::DocErrors,
                &["timestamp", "doc_id", "level", "msg"],
                vec![vec![t.clone(), "[DOC_b]".into(), "ERROR".into(), "bad".into()]],
            ),
            table(
                TableName::DocTime,
                &["doc_id", "process_invoice_finished_time", "number_of_invoices_created", "timestamp"],
                vec![vec!["[DOC_b]".into(), Value::Float(3.5), Value::Int(2), t.clone()]],
            ),
            table(
                TableName::DocLogsDuration,
                &["timestamp", "msg", "doc_id", "duration"],
                vec![vec![t, "ocr".into(), "[DOC_b]".into(), Value::Float(1.25)]],
            ),
        ])
    }

    #[test]
    fn reconcile_keeps_intersection_in_table_order() {
        let table_cols = vec!["msg".to_string(), "extra".to_string(), "level".to_string()];
        let dest = vec!["level".to_string(), "msg".to_string()];
        let rec = reconcile_columns(&table_cols, &dest);
        assert_eq!(rec.keep, vec![0, 2]);
        assert_eq!(rec.dropped, vec!["extra".to_string()]);
    }

    #[test]
    fn save_plan_writes_every_table() {
        let store = Store::open_in_memory().unwrap();
        let summary = store.save_plan(&full_plan()).unwrap();

        assert_eq!(summary.counts.len(), 8);
        assert_eq!(summary.total(), 8);
        for name in TableName::ALL {
            assert_eq!(store.count_rows(name).unwrap(), 1, "{name}");
        }
        assert_eq!(
            store.last_timestamp().unwrap().map(|t| t.to_string()),
            Some("2024-05-01 10:00:00".to_string())
        );
    }

    #[test]
    fn empty_tables_report_explicit_zero() {
        let store = Store::open_in_memory().unwrap();
        let plan = PersistencePlan::new(vec![table(
            TableName::DocErrors,
            &["doc_id", "level", "msg"],
            vec![vec!["[DOC_b]".into(), "ERROR".into(), "bad".into()]],
        )]);

        let summary = store.save_plan(&plan).unwrap();
        assert_eq!(summary.get(TableName::DocErrors), Some(1));
        assert_eq!(summary.get(TableName::ReqLogs), Some(0));
        assert_eq!(summary.counts.len(), 8);
    }

    #[test]
    fn extra_columns_are_dropped_not_fatal() {
        let store = Store::open_in_memory().unwrap();
        let plan = PersistencePlan::new(vec![table(
            TableName::ReqLogs,
            &["req_id", "level", "x_forwarded_for"],
            vec![vec!["[REQ_a]".into(), "INFO".into(), "10.0.0.1".into()]],
        )]);

        let summary = store.save_plan(&plan).unwrap();
        assert_eq!(summary.get(TableName::ReqLogs), Some(1));
    }

    #[test]
    fn missing_value_sentinels_become_null() {
        let store = Store::open_in_memory().unwrap();
        let plan = PersistencePlan::new(vec![table(
            TableName::ReqPathDuration,
            &["req_id", "duration_s", "status_code"],
            vec![vec!["[REQ_a]".into(), Value::Float(f64::NAN), "None".into()]],
        )]);
        store.save_plan(&plan).unwrap();

        let conn = store.conn();
        let (duration, status): (Option<f64>, Option<String>) = conn
            .query_row(
                "SELECT duration_s, status_code FROM logs.req_path_duration",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(duration, None);
        assert_eq!(status, None);
    }

    #[test]
    fn table_without_matching_columns_aborts_everything() {
        let store = Store::open_in_memory().unwrap();
        let plan = PersistencePlan::new(vec![
            table(
                TableName::ReqLogs,
                &["req_id", "level"],
                vec![vec!["[REQ_a]".into(), "INFO".into()]],
            ),
            table(
                TableName::DocTime,
                &["nothing", "matches"],
                vec![vec!["a".into(), "b".into()]],
            ),
        ]);

        let err = store.save_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("no matching columns"));
        assert_eq!(store.count_rows(TableName::ReqLogs).unwrap(), 0);
    }

    #[test]
    fn failure_on_fifth_table_rolls_back_all_eight() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute_batch(
                r#"DROP TABLE logs.req_path_duration;
                   CREATE TABLE logs.req_path_duration (
                     "method" TEXT,
                     "path_edited" TEXT,
                     "duration_s" DOUBLE CHECK ("duration_s" < 0),
                     "req_id" TEXT,
                     "status_code" TEXT,
                     "timestamp" TIMESTAMP
                   );"#,
            )
            .unwrap();

        let plan = full_plan();
        assert_eq!(plan.tables()[4].name, TableName::ReqPathDuration);

        let err = store.save_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("req_path_duration"));
        for name in TableName::ALL {
            assert_eq!(store.count_rows(name).unwrap(), 0, "{name} kept rows");
        }
    }
}
