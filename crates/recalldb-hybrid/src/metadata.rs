//! Per-document metadata: a date parsed from the filename and an entity
//! name obtained from the language model.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use recalldb_core::cache::{content_hash, CacheKey, DeterministicCache};
use recalldb_core::error::{Error, Result};
use recalldb_core::traits::LanguageModel;
use recalldb_core::types::RecordMetadata;
use regex::Regex;
use tracing::{debug, warn};

use crate::with_timeout;

lazy_static! {
    static ref DATE_RE: Option<Regex> = Regex::new(r"(\d{4})[_\-.](\d{2})[_\-.](\d{2})").ok();
}

const OPERATION: &str = "entity_name";

/// First valid `YYYY?MM?DD` date in `filename` as `YYYY-MM-DDT00:00:00`.
///
/// `?` is one of `_`, `-` or `.`. Matches that are not real calendar dates
/// (`2024_13_45`) are skipped.
pub fn extract_date(filename: &str) -> Option<String> {
    DATE_RE.as_ref()?.captures_iter(filename).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(date.and_hms_opt(0, 0, 0)?.format("%Y-%m-%dT%H:%M:%S").to_string())
    })
}

fn entity_prompt(kind: &str, content: &str) -> String {
    format!("Extract the {kind} name from the following text. Return only the {kind} name, nothing else:\n\nText: {content}\n")
}

pub struct MetadataExtractor {
    model: Arc<dyn LanguageModel>,
    cache: DeterministicCache,
    entity_kind: String,
    max_output_tokens: usize,
    timeout: Duration,
}

impl MetadataExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, cache: DeterministicCache, entity_kind: impl Into<String>) -> Self {
        Self {
            model,
            cache,
            entity_kind: entity_kind.into(),
            max_output_tokens: 64,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_limits(mut self, max_output_tokens: usize, timeout: Duration) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.timeout = timeout;
        self
    }

    /// Asks the model for the entity name in `content`.
    ///
    /// The trimmed reply is returned and cached as-is, even when empty.
    pub async fn extract_entity_name(&self, content: &str) -> Result<String> {
        let key = CacheKey::derive(
            OPERATION,
            &(self.model.model_id(), &self.entity_kind, self.max_output_tokens, content_hash(content)),
        )
        .map_err(Error::Metadata)?;
        self.cache
            .get_or_compute(&key, move || async move {
                let prompt = entity_prompt(&self.entity_kind, content);
                let reply = with_timeout("entity extraction", self.timeout, async {
                    self.model
                        .complete(&prompt, self.max_output_tokens)
                        .await
                        .map_err(Error::Metadata)
                })
                .await?;
                debug!(kind = %self.entity_kind, reply = %reply.trim(), "entity extracted");
                Ok::<_, Error>(reply.trim().to_string())
            })
            .await
    }

    /// Date and entity name for one document.
    ///
    /// A failed or timed-out entity call leaves `entity_name` unset; the
    /// document is still usable and nothing is cached for it.
    pub async fn extract(&self, filename: &str, content: &str) -> RecordMetadata {
        let entity_name = match self.extract_entity_name(content).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(filename, "entity name unavailable: {e}");
                None
            }
        };
        RecordMetadata { date: extract_date(filename), entity_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_underscore_dates() {
        assert_eq!(extract_date("report_2024_06_15.txt").as_deref(), Some("2024-06-15T00:00:00"));
    }

    #[test]
    fn accepts_dash_and_dot_delimiters() {
        assert_eq!(extract_date("2023-01-02-notes.md").as_deref(), Some("2023-01-02T00:00:00"));
        assert_eq!(extract_date("scan.2022.12.31.png").as_deref(), Some("2022-12-31T00:00:00"));
    }

    #[test]
    fn no_date_in_name() {
        assert_eq!(extract_date("readme.txt"), None);
        assert_eq!(extract_date("2024_6_15.txt"), None);
    }

    #[test]
    fn invalid_calendar_date_is_skipped() {
        assert_eq!(extract_date("2024_13_45.txt"), None);
        assert_eq!(extract_date("2024_02_30_then_2024_03_01.txt").as_deref(), Some("2024-03-01T00:00:00"));
    }

    #[test]
    fn prompt_names_the_entity_kind() {
        let p = entity_prompt("weapon", "a sword");
        assert!(p.starts_with("Extract the weapon name"));
        assert!(p.contains("Text: a sword"));
    }
}
