use std::time::Duration;

use logsift_core::config::Config;
use logsift_core::model::table::RunSummary;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one processing run, handed to the notifier.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub subject: String,
    pub success: bool,
    pub body: String,
    pub tables: Option<Map<String, Value>>,
}

impl RunReport {
    pub fn new(run_id: Uuid, subject: &str, summary: Option<&RunSummary>) -> Self {
        let tables = summary.map(|s| {
            s.counts
                .iter()
                .map(|(table, n)| (table.as_str().to_string(), Value::from(*n)))
                .collect()
        });
        Self {
            run_id,
            subject: subject.to_string(),
            success: summary.is_some(),
            body: render_summary(summary),
            tables,
        }
    }
}

/// Human-readable summary; `None` means the run produced nothing.
pub fn render_summary(summary: Option<&RunSummary>) -> String {
    match summary {
        None => "No logs were processed.\nCheck the run logs and try again.\n".to_string(),
        Some(summary) => {
            let mut out = String::from("Logs were processed and refreshed successfully:\n");
            for (table, rows) in &summary.counts {
                out.push_str(&format!(" - {table}: {rows} rows\n"));
            }
            out
        }
    }
}

#[derive(Clone)]
pub enum Notifier {
    Log,
    Webhook {
        client: Client,
        url: String,
        headers: HeaderMap,
    },
}

impl Notifier {
    pub fn from_config(cfg: &Config) -> Self {
        let Some(url) = cfg.notify_webhook.clone() else {
            return Self::Log;
        };
        let client = Client::builder()
            .timeout(cfg.notify_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = ?e, "failed to build notify http client; using defaults");
                Client::new()
            });
        Self::Webhook {
            client,
            url,
            headers: build_http_headers(&cfg.notify_headers),
        }
    }

    /// Delivers the report. Failures are logged, never returned.
    pub async fn notify(&self, report: &RunReport) {
        match self {
            Notifier::Log => {
                if report.success {
                    info!(run_id = %report.run_id, subject = %report.subject, "{}", report.body);
                } else {
                    warn!(run_id = %report.run_id, subject = %report.subject, "{}", report.body);
                }
            }
            Notifier::Webhook {
                client,
                url,
                headers,
            } => post_with_retries(client, url, headers, report).await,
        }
    }
}

async fn post_with_retries(client: &Client, url: &str, headers: &HeaderMap, report: &RunReport) {
    for attempt in 0..3u64 {
        let result = client
            .post(url)
            .headers(headers.clone())
            .json(report)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %url, run_id = %report.run_id, "notification delivered");
                return;
            }
            Ok(resp) => {
                warn!(url = %url, status = %resp.status(), attempt, "notification rejected");
            }
            Err(e) => {
                warn!(url = %url, error = %e, attempt, "notification request failed");
            }
        }
        tokio::time::sleep(Duration::from_millis(30 * (attempt + 1))).await;
    }
    warn!(url = %url, run_id = %report.run_id, "notification failed after retries");
}

fn build_http_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (k, v) in headers {
        let name = HeaderName::try_from(k.as_str());
        let value = HeaderValue::try_from(v.as_str());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                out.insert(name, value);
            }
            _ => {
                warn!(header = %k, "ignored invalid notify header");
            }
        }
    }
    out
}
