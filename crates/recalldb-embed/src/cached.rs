use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use recalldb_core::cache::{content_hash, CacheKey, DeterministicCache};
use recalldb_core::traits::Embedder;

const OPERATION: &str = "embed";

/// Memoizes an embedder by `(model_id, content hash)`.
///
/// The model id is part of the key, so switching providers never serves
/// vectors from a different embedding space.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: DeterministicCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: DeterministicCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = CacheKey::derive(OPERATION, &(self.inner.model_id(), content_hash(text)))?;
        self.cache.get_or_compute(&key, || self.inner.embed(text)).await
    }
}
