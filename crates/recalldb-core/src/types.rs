//! Domain types shared by the ingestor, the stores and the query engine.

use serde::{Deserialize, Serialize};

pub type RecordId = String;

/// Longest entity name still treated as a real answer rather than model chatter.
const MAX_ENTITY_NAME_CHARS: usize = 80;

/// Metadata derived from a document at ingestion time.
///
/// - `date`: ISO-8601 timestamp parsed from the filename, if any
/// - `entity_name`: raw language-model extraction, stored as returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub date: Option<String>,
    pub entity_name: Option<String>,
}

impl RecordMetadata {
    /// The entity name if it looks like a name: non-empty, single line and short.
    /// Anything else is "unknown".
    pub fn known_entity_name(&self) -> Option<&str> {
        let name = self.entity_name.as_deref()?.trim();
        if name.is_empty() || name.contains('\n') || name.chars().count() > MAX_ENTITY_NAME_CHARS {
            return None;
        }
        Some(name)
    }

    /// Calendar day of `date` (`YYYY-MM-DD`).
    pub fn day(&self) -> Option<&str> {
        self.date.as_deref().map(|d| d.split('T').next().unwrap_or(d))
    }
}

/// The unit stored in a vector collection. `content` and `embedding` always
/// travel together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: RecordId,
    pub filename: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl DistanceMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dot => "dot",
            DistanceMetric::Euclid => "euclid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "dot" => Some(DistanceMetric::Dot),
            "euclid" | "l2" => Some(DistanceMetric::Euclid),
            _ => None,
        }
    }
}

/// A record returned by a store together with its native score.
/// Higher is always better.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: DocumentRecord,
    pub score: f32,
}

/// A retrieved record after judgment and fusion; lives for one query.
#[derive(Debug, Clone)]
pub struct QueryCandidate {
    pub record: DocumentRecord,
    pub similarity_score: f32,
    pub relevance_score: f32,
    pub combined_score: f32,
}

/// Stable record id for a source path, formatted as a UUID so that stores
/// with strict id types (Qdrant) accept it.
pub fn record_id(source: &str) -> RecordId {
    let digest = blake3::hash(source.as_bytes());
    let b = digest.as_bytes();
    let hex = |r: std::ops::Range<usize>| b[r].iter().map(|x| format!("{x:02x}")).collect::<String>();
    format!("{}-{}-{}-{}-{}", hex(0..4), hex(4..6), hex(6..8), hex(8..10), hex(10..16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_is_stable_and_uuid_shaped() {
        let a = record_id("reports/2024_06_15.txt");
        assert_eq!(a, record_id("reports/2024_06_15.txt"));
        assert_ne!(a, record_id("reports/2024_06_16.txt"));
        let parts: Vec<usize> = a.split('-').map(str::len).collect();
        assert_eq!(parts, vec![8, 4, 4, 4, 12]);
    }

    #[test]
    fn malformed_entity_names_are_unknown() {
        let mut meta = RecordMetadata { date: None, entity_name: Some("  Falcon X  ".into()) };
        assert_eq!(meta.known_entity_name(), Some("Falcon X"));
        meta.entity_name = Some(String::new());
        assert_eq!(meta.known_entity_name(), None);
        meta.entity_name = Some("I could not find\nany name".into());
        assert_eq!(meta.known_entity_name(), None);
        meta.entity_name = None;
        assert_eq!(meta.known_entity_name(), None);
    }

    #[test]
    fn day_strips_time_part() {
        let meta = RecordMetadata { date: Some("2024-06-15T00:00:00".into()), entity_name: None };
        assert_eq!(meta.day(), Some("2024-06-15"));
    }
}
