use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogsiftError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, LogsiftError>;
