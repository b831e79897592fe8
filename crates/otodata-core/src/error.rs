use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtoError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Invalid table: {0}")]
    InvalidTable(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, OtoError>;
