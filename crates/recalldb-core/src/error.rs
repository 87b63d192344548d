use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unparseable relevance judgment: {0:?}")]
    JudgmentParse(String),

    #[error("Judgment service failed: {0:#}")]
    JudgmentService(anyhow::Error),

    #[error("No matching documents in collection '{collection}'")]
    NoMatch { collection: String },

    #[error("Cache write failed for {key}: {message}")]
    CacheWrite { key: String, message: String },

    #[error("Embedding provider failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("Metadata extraction failed: {0:#}")]
    Metadata(anyhow::Error),

    #[error("Vector store failed: {0:#}")]
    Store(anyhow::Error),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
