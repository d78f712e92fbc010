//! Paged pull of raw log documents from the remote search endpoint.
//!
//! Pages are requested strictly in cursor order: each request carries the
//! `sort` value of the previous page's last hit as `search_after`. The loop ends
//! on an empty page; a failed request also ends it, keeping what was fetched.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use logsift_core::config::Config;
use logsift_core::error::{LogsiftError, Result};
use logsift_core::time::to_search_boundary;
use logsift_store::Store;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

pub const RAW_FILE_NAME: &str = "search_logs.txt";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub index: String,
    pub tag: Option<String>,
    pub batch_size: usize,
    pub timeout: Duration,
}

impl FetchSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let url = cfg.search_url.clone().ok_or_else(|| {
            LogsiftError::Config("search_url is not configured (LOGSIFT_SEARCH_URL)".to_string())
        })?;
        Ok(Self {
            url,
            api_key: cfg.search_api_key.clone(),
            index: cfg.search_index.clone(),
            tag: cfg.search_tag.clone(),
            batch_size: cfg.fetch_batch_size,
            timeout: cfg.fetch_timeout,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub start: String,
    pub pages: usize,
    pub hits: usize,
}

pub struct Fetcher {
    client: Client,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LogsiftError::Fetch(format!("failed to build http client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Collects every hit's `_source` from `start` onward.
    pub async fn fetch_since(&self, start: &str) -> (Vec<Value>, usize) {
        let mut sources = Vec::new();
        let mut cursor: Option<Value> = None;
        let mut pages = 0usize;

        loop {
            let query = build_query(&self.settings, start, cursor.as_ref());
            let mut request = self
                .client
                .post(&self.settings.url)
                .header("kbn-xsrf", "true")
                .json(&query);
            if let Some(key) = &self.settings.api_key {
                request = request.header("Authorization", format!("ApiKey {key}"));
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(error = %e, pages, "search request failed");
                    break;
                }
            };
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, pages, "search returned non-success status");
                break;
            }
            let body: Value = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, pages, "search response was not json");
                    break;
                }
            };

            let (hits, next) = parse_page(&body);
            if hits.is_empty() {
                break;
            }
            pages += 1;
            sources.extend(hits);
            match next {
                Some(sort) => cursor = Some(sort),
                None => {
                    warn!(pages, "last hit carries no sort value; stopping");
                    break;
                }
            }
        }

        info!(pages, hits = sources.len(), start, "fetched search logs");
        (sources, pages)
    }

    /// Fetches from `start` and writes one JSON document per line to `path`.
    pub async fn fetch_to_file(&self, start: &str, path: &Path) -> Result<FetchOutcome> {
        let (sources, pages) = self.fetch_since(start).await;
        write_raw_lines(path, &sources)?;
        info!(path = %path.display(), lines = sources.len(), "raw log file written");
        Ok(FetchOutcome {
            path: path.to_path_buf(),
            start: start.to_string(),
            pages,
            hits: sources.len(),
        })
    }
}

/// Search request body for one page.
pub fn build_query(settings: &FetchSettings, start: &str, search_after: Option<&Value>) -> Value {
    let mut must = Vec::new();
    if let Some(tag) = &settings.tag {
        must.push(json!({ "match_phrase": { "tag": tag } }));
    }
    must.push(json!({ "range": { "@timestamp": { "gte": start } } }));

    let mut body = json!({
        "query": { "bool": { "must": must } },
        "size": settings.batch_size,
        "sort": [{ "@timestamp": "asc" }],
    });
    if let Some(cursor) = search_after {
        body["search_after"] = cursor.clone();
    }
    json!({ "params": { "index": settings.index, "body": body } })
}

/// Hit sources of one response page and the cursor for the next one.
pub fn parse_page(body: &Value) -> (Vec<Value>, Option<Value>) {
    let hits = body
        .pointer("/rawResponse/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let sources = hits
        .iter()
        .filter_map(|hit| hit.get("_source").cloned())
        .collect();
    let next = hits
        .last()
        .and_then(|hit| hit.get("sort"))
        .filter(|s| !s.is_null())
        .cloned();
    (sources, next)
}

/// Start boundary for the next fetch: the store watermark shifted into UTC,
/// or the configured default when the store is empty or unreadable.
pub fn start_boundary(store: &Store, cfg: &Config) -> String {
    let watermark = match store.last_timestamp() {
        Ok(ts) => ts,
        Err(e) => {
            warn!(error = %e, "failed to read watermark; using default start");
            None
        }
    };
    let Some(ts) = watermark else {
        return cfg.default_start.clone();
    };
    match cfg
        .source_offset()
        .and_then(|offset| to_search_boundary(ts, offset))
    {
        Ok(boundary) => boundary,
        Err(e) => {
            warn!(error = %e, "failed to render watermark; using default start");
            cfg.default_start.clone()
        }
    }
}

pub fn raw_file_path(cfg: &Config) -> PathBuf {
    cfg.raw_dir.join(RAW_FILE_NAME)
}

fn write_raw_lines(path: &Path, sources: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LogsiftError::Io(format!("failed to create {}: {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| LogsiftError::Io(format!("failed to create {}: {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    for source in sources {
        serde_json::to_writer(&mut out, source)
            .map_err(|e| LogsiftError::Io(format!("failed to write raw line: {e}")))?;
        out.write_all(b"\n")
            .map_err(|e| LogsiftError::Io(format!("failed to write raw line: {e}")))?;
    }
    out.flush()
        .map_err(|e| LogsiftError::Io(format!("failed to flush {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use logsift_core::model::record::LogRecord;
    use logsift_core::model::table::{PersistencePlan, Table, TableName};
    use logsift_core::time::parse_log_timestamp;

    use super::*;

    fn settings(url: String) -> FetchSettings {
        FetchSettings {
            url,
            api_key: Some("secret".to_string()),
            index: "kubernetes-logs-*".to_string(),
            tag: Some("kubernetes.var.log.containers.app".to_string()),
            batch_size: 2,
            timeout: Duration::from_secs(5),
        }
    }

    fn page(hits: &[(u64, &str)]) -> Value {
        let hits: Vec<Value> = hits
            .iter()
            .map(|(sort, log)| json!({ "_source": { "log": log }, "sort": [sort] }))
            .collect();
        json!({ "rawResponse": { "hits": { "hits": hits } } })
    }

    #[test]
    fn query_carries_cursor_only_after_first_page() {
        let s = settings("http://unused".to_string());
        let first = build_query(&s, "2025-02-21T00:00:00.000Z", None);
        assert_eq!(first["params"]["index"], "kubernetes-logs-*");
        assert_eq!(first["params"]["body"]["size"], 2);
        assert_eq!(
            first["params"]["body"]["query"]["bool"]["must"][1]["range"]["@timestamp"]["gte"],
            "2025-02-21T00:00:00.000Z"
        );
        assert!(first["params"]["body"].get("search_after").is_none());

        let cursor = json!([1714557600000_u64]);
        let next = build_query(&s, "2025-02-21T00:00:00.000Z", Some(&cursor));
        assert_eq!(next["params"]["body"]["search_after"], cursor);
    }

    #[test]
    fn query_without_tag_filters_on_time_only() {
        let mut s = settings("http://unused".to_string());
        s.tag = None;
        let q = build_query(&s, "x", None);
        let must = q["params"]["body"]["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
    }

    #[test]
    fn parse_page_reads_sources_and_cursor() {
        let (sources, next) = parse_page(&page(&[(1, "a"), (2, "b")]));
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1]["log"], "b");
        assert_eq!(next, Some(json!([2])));

        let (sources, next) = parse_page(&json!({ "unexpected": true }));
        assert!(sources.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn start_boundary_uses_watermark_or_default() {
        let cfg = Config::default();
        let store = Store::open_in_memory().unwrap();
        assert_eq!(start_boundary(&store, &cfg), cfg.default_start);

        let mut record = LogRecord::new();
        record.insert("timestamp", parse_log_timestamp("2025-03-01 10:00:00"));
        record.insert("req_id", "[REQ_1]");
        let table = Table::from_records(TableName::ReqLogs, &[record]);
        store.save_plan(&PersistencePlan::new([table])).unwrap();

        assert_eq!(start_boundary(&store, &cfg), "2025-03-01T09:00:00.000Z");
    }

    #[derive(Default)]
    struct Seen {
        cursors: Vec<Value>,
        auth: Vec<String>,
    }

    async fn paged(
        State(seen): State<Arc<Mutex<Seen>>>,
        headers: HeaderMap,
        Json(query): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let cursor = query["params"]["body"]
            .get("search_after")
            .cloned()
            .unwrap_or(Value::Null);
        {
            let mut seen = seen.lock().unwrap();
            seen.cursors.push(cursor.clone());
            if let Some(v) = headers.get("authorization") {
                seen.auth.push(v.to_str().unwrap().to_string());
            }
        }
        let body = match cursor.get(0).and_then(Value::as_u64) {
            None => page(&[(1, "first"), (2, "second")]),
            Some(2) => page(&[(3, "third")]),
            Some(_) => page(&[]),
        };
        (StatusCode::OK, Json(body))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/search")
    }

    #[tokio::test]
    async fn follows_cursor_until_empty_page() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let app = Router::new()
            .route("/search", post(paged))
            .with_state(seen.clone());
        let url = serve(app).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RAW_FILE_NAME);
        let fetcher = Fetcher::new(settings(url)).unwrap();
        let outcome = fetcher
            .fetch_to_file("2025-02-21T00:00:00.000Z", &path)
            .await
            .unwrap();

        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.hits, 3);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.cursors, vec![Value::Null, json!([2]), json!([3])]);
        assert!(seen.auth.iter().all(|a| a == "ApiKey secret"));

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], r#"{"log":"third"}"#);
    }

    #[tokio::test]
    async fn non_success_status_keeps_earlier_pages() {
        async fn flaky(Json(query): Json<Value>) -> (StatusCode, Json<Value>) {
            if query["params"]["body"].get("search_after").is_some() {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
            } else {
                (StatusCode::OK, Json(page(&[(1, "kept")])))
            }
        }
        let url = serve(Router::new().route("/search", post(flaky))).await;

        let fetcher = Fetcher::new(settings(url)).unwrap();
        let (sources, pages) = fetcher.fetch_since("2025-02-21T00:00:00.000Z").await;
        assert_eq!(pages, 1);
        assert_eq!(sources, vec![json!({ "log": "kept" })]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_nothing() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = Fetcher::new(settings(format!("http://{addr}/search"))).unwrap();
        let (sources, pages) = fetcher.fetch_since("2025-02-21T00:00:00.000Z").await;
        assert!(sources.is_empty());
        assert_eq!(pages, 0);
    }
}
