use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use duckdb::Connection;
use logsift_core::error::{LogsiftError, Result};
use logsift_core::model::table::{DEST_SCHEMA, TableName};
use serde::Serialize;

use crate::schema::SCHEMA_SQL;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub tables: Vec<(TableName, usize)>,
    pub watermark: Option<NaiveDateTime>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LogsiftError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| LogsiftError::Store(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| LogsiftError::Store(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LogsiftError::Store(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| LogsiftError::Store(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        })
    }

    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Latest request-log timestamp already persisted, the next fetch's lower bound.
    pub fn last_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        let conn = self.conn();
        scalar_ts(
            &conn,
            &format!("SELECT MAX(\"timestamp\") FROM {DEST_SCHEMA}.req_logs"),
        )
    }

    pub fn count_rows(&self, table: TableName) -> Result<usize> {
        let conn = self.conn();
        scalar_usize(
            &conn,
            &format!("SELECT COUNT(*) FROM {DEST_SCHEMA}.{}", table.as_str()),
        )
    }

    pub fn status(&self) -> Result<StoreStatus> {
        let tables = TableName::ALL
            .into_iter()
            .map(|t| self.count_rows(t).map(|n| (t, n)))
            .collect::<Result<Vec<_>>>()?;
        let watermark = self.last_timestamp()?;

        let db_size_bytes = if self.db_path == ":memory:" {
            0
        } else {
            fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStatus {
            db_path: self.db_path.clone(),
            db_size_bytes,
            tables,
            watermark,
        })
    }
}

fn scalar_usize(conn: &Connection, sql: &str) -> Result<usize> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|v| v as usize)
        .map_err(|e| LogsiftError::Store(format!("query failed: {e}")))
}

fn scalar_ts(conn: &Connection, sql: &str) -> Result<Option<NaiveDateTime>> {
    conn.query_row(sql, [], |row| row.get::<_, Option<NaiveDateTime>>(0))
        .map_err(|e| LogsiftError::Store(format!("query failed: {e}")))
}
