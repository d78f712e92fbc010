pub const SCHEMA_SQL: &str = r#"
CREATE SCHEMA IF NOT EXISTS logs;

CREATE TABLE IF NOT EXISTS logs.req_logs (
  "timestamp" TIMESTAMP,
  "module" TEXT,
  "level" TEXT,
  "req_id" TEXT,
  "msg" TEXT,
  "method" TEXT,
  "path" TEXT,
  "path_edited" TEXT,
  "status_code" TEXT,
  "duration_s" DOUBLE,
  "login" TEXT,
  "ip" TEXT,
  "error_message" TEXT,
  "error_detail" TEXT
);

CREATE TABLE IF NOT EXISTS logs.doc_logs (
  "timestamp" TIMESTAMP,
  "module" TEXT,
  "level" TEXT,
  "doc_id" TEXT,
  "msg" TEXT,
  "duration" DOUBLE,
  "number_of_invoices_created" BIGINT,
  "process_invoice_finished_time" DOUBLE,
  "input_tokens" BIGINT,
  "output_tokens" BIGINT,
  "error_message" TEXT,
  "error_detail" TEXT
);

CREATE TABLE IF NOT EXISTS logs.req_errors (
  "timestamp" TIMESTAMP,
  "req_id" TEXT,
  "level" TEXT,
  "error_detail" TEXT,
  "status_code" TEXT
);

CREATE TABLE IF NOT EXISTS logs.req_login (
  "timestamp" TIMESTAMP,
  "req_id" TEXT,
  "login" TEXT,
  "duration" DOUBLE,
  "status_code" TEXT,
  "error_message" TEXT,
  "error_detail" TEXT,
  "ip" TEXT
);

CREATE TABLE IF NOT EXISTS logs.req_path_duration (
  "method" TEXT,
  "path_edited" TEXT,
  "duration_s" DOUBLE,
  "req_id" TEXT,
  "status_code" TEXT,
  "timestamp" TIMESTAMP
);

CREATE TABLE IF NOT EXISTS logs.doc_errors (
  "timestamp" TIMESTAMP,
  "doc_id" TEXT,
  "level" TEXT,
  "msg" TEXT
);

CREATE TABLE IF NOT EXISTS logs.doc_time (
  "doc_id" TEXT,
  "process_invoice_finished_time" DOUBLE,
  "number_of_invoices_created" BIGINT,
  "timestamp" TIMESTAMP
);

CREATE TABLE IF NOT EXISTS logs.doc_logs_duration (
  "timestamp" TIMESTAMP,
  "msg" TEXT,
  "doc_id" TEXT,
  "duration" DOUBLE
);

CREATE INDEX IF NOT EXISTS idx_req_logs_ts ON logs.req_logs("timestamp");
CREATE INDEX IF NOT EXISTS idx_req_logs_req ON logs.req_logs(req_id);
CREATE INDEX IF NOT EXISTS idx_doc_logs_doc ON logs.doc_logs(doc_id);
"#;
