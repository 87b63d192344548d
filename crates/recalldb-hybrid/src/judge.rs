use std::sync::Arc;
use std::time::Duration;

use recalldb_core::cache::{content_hash, CacheKey, DeterministicCache};
use recalldb_core::error::{Error, Result};
use recalldb_core::traits::LanguageModel;
use tracing::{debug, warn};

use crate::with_timeout;

const OPERATION: &str = "relevance";

fn judgment_prompt(query: &str, content: &str) -> String {
    format!(
        "Rate how well this document answers the question.\n\
         Return only a number between 0 and 1, where:\n\
         1 = the document is entirely about the question\n\
         0 = the document has nothing to do with the question\n\n\
         Question: {query}\n\n\
         Document: {content}\n\n\
         Score (0-1):"
    )
}

fn strict_prompt(query: &str, content: &str) -> String {
    format!(
        "{}\n\nYour previous answer was not a number. Reply with one decimal number between 0 and 1 and no other text.",
        judgment_prompt(query, content)
    )
}

/// Parses a model reply as a relevance score clamped to `[0, 1]`.
///
/// Returns `None` when the trimmed reply is not a finite float literal.
pub fn parse_relevance(reply: &str) -> Option<f32> {
    let value: f32 = reply.trim().parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

/// Scores `(query, document)` pairs with the language model.
///
/// Raw replies are memoized per prompt, so repeating a query against the
/// same documents does not call the model again.
pub struct RelevanceJudge {
    model: Arc<dyn LanguageModel>,
    cache: DeterministicCache,
    max_output_tokens: usize,
    timeout: Duration,
    retry_unparseable: bool,
}

impl RelevanceJudge {
    pub fn new(model: Arc<dyn LanguageModel>, cache: DeterministicCache) -> Self {
        Self { model, cache, max_output_tokens: 16, timeout: Duration::from_secs(120), retry_unparseable: false }
    }

    pub fn with_limits(mut self, max_output_tokens: usize, timeout: Duration) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.timeout = timeout;
        self
    }

    /// Ask once more with a stricter prompt when the first reply does not parse.
    pub fn retry_unparseable(mut self, enabled: bool) -> Self {
        self.retry_unparseable = enabled;
        self
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        let key = CacheKey::derive(OPERATION, &(self.model.model_id(), self.max_output_tokens, content_hash(prompt)))
            .map_err(Error::JudgmentService)?;
        self.cache
            .get_or_compute(&key, move || {
                with_timeout("relevance judgment", self.timeout, async move {
                    self.model.complete(prompt, self.max_output_tokens).await.map_err(Error::JudgmentService)
                })
            })
            .await
    }

    /// Relevance of `content` to `query` in `[0, 1]`.
    ///
    /// An unparseable reply scores 0.0. Only service failures and timeouts
    /// are errors.
    pub async fn judge(&self, query: &str, content: &str) -> Result<f32> {
        let reply = self.ask(&judgment_prompt(query, content)).await?;
        if let Some(score) = parse_relevance(&reply) {
            debug!(score, "relevance judged");
            return Ok(score);
        }
        if self.retry_unparseable {
            let second = self.ask(&strict_prompt(query, content)).await?;
            if let Some(score) = parse_relevance(&second) {
                debug!(score, "relevance judged on retry");
                return Ok(score);
            }
            warn!("{}; scoring 0.0", Error::JudgmentParse(second));
            return Ok(0.0);
        }
        warn!("{}; scoring 0.0", Error::JudgmentParse(reply));
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_unit_interval() {
        assert_eq!(parse_relevance("1.7"), Some(1.0));
        assert_eq!(parse_relevance("-0.3"), Some(0.0));
        assert_eq!(parse_relevance(" 0.85\n"), Some(0.85));
    }

    #[test]
    fn rejects_non_numbers() {
        assert_eq!(parse_relevance("abc"), None);
        assert_eq!(parse_relevance(""), None);
        assert_eq!(parse_relevance("Score: 0.5"), None);
        assert_eq!(parse_relevance("NaN"), None);
        assert_eq!(parse_relevance("inf"), None);
    }

    #[test]
    fn strict_prompt_extends_the_base_prompt() {
        let base = judgment_prompt("q", "doc");
        assert!(strict_prompt("q", "doc").starts_with(&base));
        assert!(base.contains("Question: q"));
        assert!(base.ends_with("Score (0-1):"));
    }
}
