//! recalldb-hybrid
//!
//! The two pipelines: [`Ingestor`] turns a directory into stored records and
//! [`HybridQueryEngine`] answers queries by combining vector similarity with a
//! language-model relevance judgment.

use std::future::Future;
use std::time::Duration;

use recalldb_core::error::{Error, Result};

pub mod engine;
pub mod ingest;
pub mod judge;
pub mod metadata;
pub mod ranking;

pub use engine::HybridQueryEngine;
pub use ingest::{IngestFailure, IngestReport, Ingestor};
pub use judge::{parse_relevance, RelevanceJudge};
pub use metadata::{extract_date, MetadataExtractor};
pub use ranking::{fuse, rank};

/// Runs `fut` with a deadline; on expiry the future is dropped.
pub(crate) async fn with_timeout<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation: operation.to_string(), seconds: limit.as_secs() }),
    }
}
