use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use recalldb_core::traits::LanguageModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::post_json;

/// Local model served by Ollama (`/api/generate`, non-streaming).
pub struct OllamaModel {
    client: Client,
    endpoint: String,
    model: String,
    id: String,
    max_retries: usize,
}

impl OllamaModel {
    pub fn new(base_url: String, model: String, timeout: Duration, max_retries: usize) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing Ollama model name");
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Ollama base url must be an http(s) URL"
        );
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Ollama HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            id: format!("ollama:{model}"),
            model,
            max_retries: max_retries.max(1),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, prompt: &str, max_output_tokens: usize) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0, num_predict: max_output_tokens },
        };
        let parsed: GenerateResponse = post_json(&self.client, &self.endpoint, &body, self.max_retries, "Ollama generate").await?;
        Ok(parsed.response)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
