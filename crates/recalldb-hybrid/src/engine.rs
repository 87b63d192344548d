use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt, TryStreamExt};
use recalldb_core::cache::DeterministicCache;
use recalldb_core::error::{Error, Result};
use recalldb_core::traits::{Embedder, VectorStore};
use recalldb_core::types::QueryCandidate;
use recalldb_embed::CachedEmbedder;
use tracing::{debug, info};

use crate::judge::RelevanceJudge;
use crate::ranking::{fuse, rank};
use crate::with_timeout;

/// Vector retrieval re-ranked by model relevance.
pub struct HybridQueryEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    judge: RelevanceJudge,
    collection: String,
    concurrency: usize,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl HybridQueryEngine {
    /// `embedder` must be the one the collection was ingested with. Query
    /// embeddings go through `cache`.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        cache: DeterministicCache,
        store: Arc<dyn VectorStore>,
        judge: RelevanceJudge,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder: Arc::new(CachedEmbedder::new(embedder, cache)),
            store,
            judge,
            collection: collection.into(),
            concurrency: 4,
            embed_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(30),
        }
    }

    /// Maximum judgments in flight per query.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Top `k` records for `query`, ranked by combined score.
    ///
    /// Fails with `NoMatch` when retrieval finds nothing and aborts on the
    /// first judgment service failure.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<QueryCandidate>> {
        let vector = with_timeout("query embedding", self.embed_timeout, async {
            self.embedder.embed(query).await.map_err(Error::Embedding)
        })
        .await?;

        let hits = with_timeout("vector search", self.store_timeout, async {
            self.store.search(&self.collection, &vector, k).await.map_err(Error::Store)
        })
        .await?;
        if hits.is_empty() {
            return Err(Error::NoMatch { collection: self.collection.clone() });
        }
        debug!(retrieved = hits.len(), "judging candidates");

        // `buffered` yields in input order, so scores line up with `hits`
        let relevance: Vec<f32> = stream::iter(hits.iter().map(|h| self.judge.judge(query, &h.record.content)))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut candidates: Vec<QueryCandidate> = hits
            .into_iter()
            .zip(relevance)
            .map(|(hit, relevance_score)| QueryCandidate {
                combined_score: fuse(hit.score, relevance_score),
                similarity_score: hit.score,
                relevance_score,
                record: hit.record,
            })
            .collect();
        rank(&mut candidates);

        if let Some(best) = candidates.first() {
            info!(
                filename = %best.record.filename,
                combined = best.combined_score,
                candidates = candidates.len(),
                "query ranked"
            );
        }
        Ok(candidates)
    }

    /// The top-ranked candidate of [`search`](Self::search).
    pub async fn best_match(&self, query: &str, k: usize) -> Result<QueryCandidate> {
        self.search(query, k)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoMatch { collection: self.collection.clone() })
    }
}
