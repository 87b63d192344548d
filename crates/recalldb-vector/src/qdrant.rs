//! Qdrant REST backend.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use recalldb_core::traits::VectorStore;
use recalldb_core::types::{DistanceMetric, DocumentRecord, RecordMetadata, ScoredRecord};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Talks to a Qdrant server over its HTTP API.
///
/// Point ids are the record ids, which are already UUID-shaped. The record
/// fields travel in the point payload.
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Qdrant url must be an http(s) URL"
        );
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            headers.insert("api-key", HeaderValue::from_str(key.trim()).context("invalid Qdrant API key")?);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Qdrant HTTP client")?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

async fn send(request: RequestBuilder, label: &str) -> Result<Value> {
    let resp = request.send().await.with_context(|| format!("{label} request failed"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
        bail!("{label} failed ({status}): {body}");
    }
    resp.json().await.with_context(|| format!("failed to parse {label} response"))
}

fn qdrant_distance(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "Cosine",
        DistanceMetric::Dot => "Dot",
        DistanceMetric::Euclid => "Euclid",
    }
}

#[derive(Serialize, Deserialize)]
struct Payload {
    filename: String,
    content: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    entity_name: Option<String>,
}

#[derive(Serialize)]
struct Point<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: Payload,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
    #[serde(default)]
    distance: Option<String>,
}

impl CollectionInfo {
    fn is_euclid(&self) -> bool {
        self.result.config.params.vectors.distance.as_deref() == Some("Euclid")
    }
}

impl QdrantStore {
    async fn info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let resp = self
            .client
            .get(self.url(&format!("collections/{name}")))
            .send()
            .await
            .context("Qdrant collection lookup failed")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Qdrant collection lookup failed ({status}): {body}");
        }
        Ok(Some(resp.json().await.context("failed to parse Qdrant collection info")?))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.info(name).await?.map(|i| i.result.config.params.vectors.size))
    }

    async fn create_collection(&self, name: &str, dimension: usize, metric: DistanceMetric) -> Result<()> {
        if let Some(size) = self.collection_dimension(name).await? {
            anyhow::ensure!(size == dimension, "collection '{name}' already exists with dimension {size}");
            return Ok(());
        }
        let body = json!({ "vectors": { "size": dimension, "distance": qdrant_distance(metric) } });
        send(self.client.put(self.url(&format!("collections/{name}"))).json(&body), "Qdrant create collection").await?;
        debug!(collection = name, dimension, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[DocumentRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let points: Vec<Point<'_>> = records
            .iter()
            .map(|r| Point {
                id: &r.id,
                vector: &r.embedding,
                payload: Payload {
                    filename: r.filename.clone(),
                    content: r.content.clone(),
                    date: r.metadata.date.clone(),
                    entity_name: r.metadata.entity_name.clone(),
                },
            })
            .collect();
        let url = self.url(&format!("collections/{collection}/points?wait=true"));
        send(self.client.put(url).json(&json!({ "points": points })), "Qdrant upsert").await?;
        Ok(())
    }

    async fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let Some(info) = self.info(collection).await? else {
            return Ok(Vec::new());
        };
        let body = json!({ "vector": query, "limit": k, "with_payload": true, "with_vector": true });
        let url = self.url(&format!("collections/{collection}/points/search"));
        let raw = send(self.client.post(url).json(&body), "Qdrant search").await?;
        let parsed: SearchResponse = serde_json::from_value(raw).context("unexpected Qdrant search payload")?;
        let euclid = info.is_euclid();
        parsed
            .result
            .into_iter()
            .map(|p| {
                let payload = p.payload.ok_or_else(|| anyhow!("Qdrant point {} has no payload", p.id))?;
                let id = match p.id {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Ok(ScoredRecord {
                    record: DocumentRecord {
                        id,
                        filename: payload.filename,
                        content: payload.content,
                        embedding: p.vector.unwrap_or_default(),
                        metadata: RecordMetadata { date: payload.date, entity_name: payload.entity_name },
                    },
                    score: if euclid { -p.score } else { p.score },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_url() {
        assert!(QdrantStore::new("localhost:6333".into(), None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let store = QdrantStore::new("http://localhost:6333/".into(), None, Duration::from_secs(1)).unwrap();
        assert_eq!(store.url("/collections/docs"), "http://localhost:6333/collections/docs");
    }

    #[test]
    fn parses_collection_info() {
        let info: CollectionInfo = serde_json::from_value(json!({
            "result": { "config": { "params": { "vectors": { "size": 1536, "distance": "Cosine" } } } }
        }))
        .unwrap();
        assert_eq!(info.result.config.params.vectors.size, 1536);
        assert!(!info.is_euclid());
    }
}
