use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{LogsiftError, Result};

pub const DEFAULT_START: &str = "2025-02-21T00:00:00.000Z";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub search_url: Option<String>,
    pub search_api_key: Option<String>,
    pub search_index: String,
    pub search_tag: Option<String>,
    pub fetch_batch_size: usize,
    pub fetch_timeout: Duration,
    pub default_start: String,
    pub source_utc_offset: String,
    pub raw_dir: PathBuf,
    pub notify_webhook: Option<String>,
    pub notify_headers: Vec<(String, String)>,
    pub notify_subject: String,
    pub notify_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_home = env::var("XDG_DATA_HOME").ok();

        let data_root = data_home
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".local/share"));

        Self {
            db_path: data_root.join("logsift/logsift.duckdb"),
            search_url: None,
            search_api_key: None,
            search_index: "kubernetes-logs-*".to_string(),
            search_tag: None,
            fetch_batch_size: 5000,
            fetch_timeout: Duration::from_secs(30),
            default_start: DEFAULT_START.to_string(),
            source_utc_offset: "+01:00".to_string(),
            raw_dir: env::temp_dir(),
            notify_webhook: None,
            notify_headers: Vec::new(),
            notify_subject: "Logs Update".to_string(),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Offset that naive log timestamps were written in.
    pub fn source_offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.source_utc_offset)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    search_url: Option<String>,
    search_api_key: Option<String>,
    search_index: Option<String>,
    search_tag: Option<String>,
    fetch_batch_size: Option<usize>,
    fetch_timeout: Option<String>,
    default_start: Option<String>,
    source_utc_offset: Option<String>,
    raw_dir: Option<PathBuf>,
    notify_webhook: Option<String>,
    notify_headers: Option<String>,
    notify_subject: Option<String>,
    notify_timeout: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("LOGSIFT_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("logsift/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LogsiftError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| LogsiftError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let fetch_batch_size = match env::var("LOGSIFT_FETCH_BATCH_SIZE") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            LogsiftError::Config(format!("bad LOGSIFT_FETCH_BATCH_SIZE in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        db_path: env::var("LOGSIFT_DB_PATH").ok().map(PathBuf::from),
        search_url: env::var("LOGSIFT_SEARCH_URL").ok(),
        search_api_key: env::var("LOGSIFT_SEARCH_API_KEY").ok(),
        search_index: env::var("LOGSIFT_SEARCH_INDEX").ok(),
        search_tag: env::var("LOGSIFT_SEARCH_TAG").ok(),
        fetch_batch_size,
        fetch_timeout: env::var("LOGSIFT_FETCH_TIMEOUT").ok(),
        default_start: env::var("LOGSIFT_DEFAULT_START").ok(),
        source_utc_offset: env::var("LOGSIFT_SOURCE_UTC_OFFSET").ok(),
        raw_dir: env::var("LOGSIFT_RAW_DIR").ok().map(PathBuf::from),
        notify_webhook: env::var("LOGSIFT_NOTIFY_WEBHOOK").ok(),
        notify_headers: env::var("LOGSIFT_NOTIFY_HEADERS").ok(),
        notify_subject: env::var("LOGSIFT_NOTIFY_SUBJECT").ok(),
        notify_timeout: env::var("LOGSIFT_NOTIFY_TIMEOUT").ok(),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.search_url {
        cfg.search_url = Some(v);
    }
    if let Some(v) = overrides.search_api_key {
        cfg.search_api_key = Some(v);
    }
    if let Some(v) = overrides.search_index {
        cfg.search_index = v;
    }
    if let Some(v) = overrides.search_tag {
        cfg.search_tag = Some(v).filter(|t| !t.trim().is_empty());
    }
    if let Some(v) = overrides.fetch_batch_size {
        if v == 0 {
            return Err(LogsiftError::Config(format!(
                "bad fetch_batch_size in {source}: must be positive"
            )));
        }
        cfg.fetch_batch_size = v;
    }
    if let Some(v) = overrides.fetch_timeout {
        cfg.fetch_timeout = humantime::parse_duration(&v).map_err(|e| {
            LogsiftError::Config(format!("bad fetch_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.default_start {
        cfg.default_start = v;
    }
    if let Some(v) = overrides.source_utc_offset {
        parse_offset(&v).map_err(|e| {
            LogsiftError::Config(format!("bad source_utc_offset in {source}: {e}"))
        })?;
        cfg.source_utc_offset = v;
    }
    if let Some(v) = overrides.raw_dir {
        cfg.raw_dir = v;
    }
    if let Some(v) = overrides.notify_webhook {
        cfg.notify_webhook = Some(v);
    }
    if let Some(v) = overrides.notify_headers {
        cfg.notify_headers = parse_headers(&v).map_err(|e| {
            LogsiftError::Config(format!("bad notify_headers in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.notify_subject {
        cfg.notify_subject = v;
    }
    if let Some(v) = overrides.notify_timeout {
        cfg.notify_timeout = humantime::parse_duration(&v).map_err(|e| {
            LogsiftError::Config(format!("bad notify_timeout in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

fn parse_offset(raw: &str) -> Result<FixedOffset> {
    raw.trim()
        .parse::<FixedOffset>()
        .map_err(|e| LogsiftError::Parse(format!("invalid utc offset {raw}: {e}")))
}

fn parse_headers(raw: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for entry in raw.split(',') {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(LogsiftError::Config(
                "header entries must use key=value syntax".to_string(),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(LogsiftError::Config("header key cannot be empty".to_string()));
        }
        out.push((key.to_string(), value.trim().to_string()));
    }
    Ok(out)
}
