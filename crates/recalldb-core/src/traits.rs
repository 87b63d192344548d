use std::path::Path;

use async_trait::async_trait;

use crate::types::{DistanceMetric, DocumentRecord, ScoredRecord};

/// Turns a text into a fixed-length vector. Providers must return vectors
/// of the same dimensionality for a given `model_id`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn model_id(&self) -> &str;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Text completion used both for metadata extraction and relevance judgment.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn complete(&self, prompt: &str, max_output_tokens: usize) -> anyhow::Result<String>;
}

/// Nearest-neighbor search plus upsert over named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimensionality of an existing collection, `None` if it does not exist.
    async fn collection_dimension(&self, name: &str) -> anyhow::Result<Option<usize>>;
    async fn create_collection(&self, name: &str, dimension: usize, metric: DistanceMetric) -> anyhow::Result<()>;
    /// Insert or replace records by id. Atomic per call at the store's consistency level.
    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> anyhow::Result<()>;
    /// Up to `k` records ordered by native score, best first.
    async fn search(&self, collection: &str, query: &[f32], k: usize) -> anyhow::Result<Vec<ScoredRecord>>;
}

/// Turns a file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> anyhow::Result<String>;
}
