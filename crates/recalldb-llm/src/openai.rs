use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use recalldb_core::traits::LanguageModel;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::post_json;

/// Chat completions against an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    model: String,
    id: String,
    max_retries: usize,
}

impl OpenAiChatModel {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration, max_retries: usize) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI model name");
        let mut headers = HeaderMap::new();
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
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            id: format!("openai:{model}"),
            model,
            max_retries: max_retries.max(1),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, prompt: &str, max_output_tokens: usize) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            max_tokens: max_output_tokens,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };
        let parsed: ChatResponse = post_json(&self.client, &self.endpoint, &body, self.max_retries, "OpenAI chat completions").await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_content_is_empty_answer() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
        let answer = parsed.choices.into_iter().next().and_then(|c| c.message.content).unwrap_or_default();
        assert_eq!(answer, "");
    }
}
