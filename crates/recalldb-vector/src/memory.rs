//! In-process vector store with brute-force search.
//!
//! Used by tests and by `store.backend = "memory"` for throwaway runs.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use recalldb_core::traits::VectorStore;
use recalldb_core::types::{DistanceMetric, DocumentRecord, ScoredRecord};

struct Collection {
    dimension: usize,
    metric: DistanceMetric,
    records: Vec<DocumentRecord>,
    by_id: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`, or 0 when it does not exist.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, |c| c.records.len()))
            .unwrap_or(0)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON { 0.0 } else { dot / denom }
}

fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceMetric::Euclid => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("memory store lock poisoned")
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(name).map(|c| c.dimension))
    }

    async fn create_collection(&self, name: &str, dimension: usize, metric: DistanceMetric) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        if let Some(existing) = collections.get(name) {
            if existing.dimension != dimension {
                bail!("collection '{name}' already exists with dimension {}", existing.dimension);
            }
            return Ok(());
        }
        collections.insert(
            name.to_string(),
            Collection { dimension, metric, records: Vec::new(), by_id: HashMap::new() },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        // all or nothing
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != coll.dimension) {
            bail!(
                "record {} has {} dims, collection '{}' expects {}",
                bad.id,
                bad.embedding.len(),
                collection,
                coll.dimension
            );
        }
        for record in records {
            match coll.by_id.get(&record.id) {
                Some(&slot) => coll.records[slot] = record.clone(),
                None => {
                    coll.by_id.insert(record.id.clone(), coll.records.len());
                    coll.records.push(record.clone());
                }
            }
        }
        Ok(())
    }

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        if query.len() != coll.dimension {
            bail!("query has {} dims, collection '{}' expects {}", query.len(), collection, coll.dimension);
        }
        let mut hits: Vec<ScoredRecord> = coll
            .records
            .iter()
            .map(|r| ScoredRecord { record: r.clone(), score: score(coll.metric, query, &r.embedding) })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn euclid_prefers_closer_points() {
        let near = score(DistanceMetric::Euclid, &[0.0, 0.0], &[1.0, 0.0]);
        let far = score(DistanceMetric::Euclid, &[0.0, 0.0], &[3.0, 0.0]);
        assert!(near > far);
    }
}
