//! Language-model providers behind `recalldb_core::traits::LanguageModel`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use recalldb_core::config::LlmSettings;
use recalldb_core::traits::LanguageModel;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

mod ollama;
mod openai;

pub use ollama::OllamaModel;
pub use openai::OpenAiChatModel;

/// Provider selected by `llm.provider`.
pub fn get_default_language_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    match settings.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaModel::new(
            settings.base_url.clone(),
            settings.model.clone(),
            timeout,
            settings.max_retries,
        )?)),
        "openai" => {
            let api_key = std::env::var(&settings.api_key_env).unwrap_or_default();
            Ok(Arc::new(OpenAiChatModel::new(
                api_key,
                settings.base_url.clone(),
                settings.model.clone(),
                timeout,
                settings.max_retries,
            )?))
        }
        other => bail!("unknown llm provider '{other}'"),
    }
}

/// POST a JSON body and decode the JSON reply, retrying 429/5xx and
/// transport failures with capped exponential backoff.
///
/// Shared by every HTTP provider in the workspace; `label` names the
/// endpoint in logs and errors.
pub async fn post_json<B, R>(client: &Client, url: &str, body: &B, max_retries: usize, label: &str) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut attempt = 0usize;
    loop {
        match client.post(url).json(body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.json().await.with_context(|| format!("failed to parse {label} response"));
                }
                let text = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
                if should_retry(status) && attempt + 1 < max_retries {
                    attempt += 1;
                    warn!(%status, attempt, "retrying {label} request");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                bail!("{label} returned {status}: {text}");
            }
            Err(err) => {
                if is_retryable_error(&err) && attempt + 1 < max_retries {
                    attempt += 1;
                    warn!(error = %err, attempt, "retrying {label} request");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                return Err(err).with_context(|| format!("failed to call {label}"));
            }
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(9), retry_backoff(5));
    }

    #[test]
    fn retries_rate_limits_and_server_errors_only() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::BAD_GATEWAY));
        assert!(!should_retry(StatusCode::UNAUTHORIZED));
    }
}
