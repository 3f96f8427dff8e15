//! Error types shared by the dedup and ingest commands.

use std::io;
use thiserror::Error;

/// Errors raised by an [`ObjectStore`](crate::object_store::ObjectStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Transport-level OCR failures. A well-formed HTTP exchange that returns
/// an unusable body is not an error, see [`OcrOutcome`](crate::ocr::OcrOutcome).
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OCR backend misconfigured: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid collection name `{0}`")]
    InvalidCollection(String),
    #[error("document store connection poisoned")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("failed to decode trigger event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("trigger event contains no records")]
    NoRecords,
    #[error("object key `{0}` is not valid URL encoding")]
    KeyEncoding(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value `{value}` for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Everything that can abort one ingest invocation.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("trigger error: {0}")]
    Trigger(#[from] TriggerError),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),
    #[error("document store error: {0}")]
    DocStore(#[from] DocStoreError),
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}
