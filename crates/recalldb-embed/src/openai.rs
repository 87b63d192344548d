//! OpenAI-based embedding client implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use recalldb_core::traits::Embedder;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use recalldb_llm::post_json;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    id: String,
    dimensions: Option<usize>,
    max_retries: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI model name");
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        // dimensions change the output, so they are part of the identity
        let id = match dimensions {
            Some(d) => format!("openai:{model}:d{d}"),
            None => format!("openai:{model}"),
        };
        Ok(Self {
            client,
            endpoint,
            model,
            id,
            dimensions,
            max_retries: max_retries.max(1),
        })
    }

    /// Sends a batch of strings and returns embedding vectors in input order.
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };
        let mut parsed: EmbeddingResponse =
            post_json(&self.client, &self.endpoint, &request, self.max_retries, "OpenAI embeddings").await?;
        parsed.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            parsed.data.len() == inputs.len(),
            "OpenAI returned {} embeddings for {} inputs",
            parsed.data.len(),
            inputs.len()
        );
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text]).await?;
        out.pop().context("OpenAI returned no embedding")
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_includes_requested_dimensions() {
        let e = OpenAiEmbedder::new(
            "sk-test".into(),
            "https://api.openai.com/v1/".into(),
            "text-embedding-3-small".into(),
            Some(256),
            Duration::from_secs(5),
            3,
        )
        .unwrap();
        assert_eq!(e.model_id(), "openai:text-embedding-3-small:d256");
        assert_eq!(e.endpoint, "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn missing_key_is_rejected() {
        let res = OpenAiEmbedder::new(" ".into(), "http://x".into(), "m".into(), None, Duration::from_secs(1), 1);
        assert!(res.is_err());
    }
}
