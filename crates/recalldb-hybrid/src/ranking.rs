use recalldb_core::types::QueryCandidate;

/// Equal-weight average of vector similarity and model relevance.
pub fn fuse(similarity: f32, relevance: f32) -> f32 {
    (similarity + relevance) / 2.0
}

/// Sorts by `combined_score`, best first. The sort is stable, so equal
/// scores stay in retrieval order.
pub fn rank(candidates: &mut [QueryCandidate]) {
    candidates.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use recalldb_core::types::{DocumentRecord, RecordMetadata};

    fn candidate(id: &str, combined: f32) -> QueryCandidate {
        QueryCandidate {
            record: DocumentRecord {
                id: id.into(),
                filename: id.into(),
                content: String::new(),
                embedding: vec![],
                metadata: RecordMetadata::default(),
            },
            similarity_score: combined,
            relevance_score: combined,
            combined_score: combined,
        }
    }

    #[test]
    fn fusion_is_the_mean() {
        assert_eq!(fuse(0.8, 0.4), 0.6);
        assert_eq!(fuse(1.0, 0.0), 0.5);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let mut cs = vec![candidate("a", 0.5), candidate("b", 0.9), candidate("c", 0.5), candidate("d", 0.5)];
        rank(&mut cs);
        let ids: Vec<_> = cs.iter().map(|c| c.record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c", "d"]);
    }
}
