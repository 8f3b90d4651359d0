//! Keyword-overlap similarity provider
//!
//! A deterministic, in-process stand-in for a vector-search service. Scores
//! are the fraction of query terms found in the candidate text, which is
//! crude but stable and dependency-free; swap in an embedding-backed
//! provider for production relevance.

use super::{ChangeQuery, ChangeRepository, ScoredItem, SimilarityProvider};
use crate::domain::GlossaryNote;
use crate::error::Result;
use crate::repo::MemoryRepository;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Lexical similarity over repository changes and glossary patterns
pub struct LexicalSimilarity {
    repository: Arc<MemoryRepository>,
    patterns: Vec<GlossaryNote>,
}

impl LexicalSimilarity {
    pub fn new(repository: Arc<MemoryRepository>, patterns: Vec<GlossaryNote>) -> Self {
        Self {
            repository,
            patterns,
        }
    }

    /// Fraction of query terms present in the candidate text
    fn overlap_score(query_terms: &HashSet<String>, candidate: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let candidate_terms: HashSet<String> = tokenize(candidate);
        let overlap = query_terms.intersection(&candidate_terms).count();
        overlap as f32 / query_terms.len() as f32
    }

    fn rank(mut scored: Vec<ScoredItem>, k: usize, threshold: f32) -> Vec<ScoredItem> {
        scored.retain(|item| item.score >= threshold);
        // Stable sort keeps corpus order for equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}

#[async_trait]
impl SimilarityProvider for LexicalSimilarity {
    async fn similar_changes(
        &self,
        query_text: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredItem>> {
        let query_terms = tokenize(query_text);
        let changes = self.repository.query_changes(ChangeQuery::default()).await?;

        let scored = changes
            .into_iter()
            .map(|cwm| {
                let haystack = format!("{} {}", cwm.change.category, cwm.change.description);
                let score = Self::overlap_score(&query_terms, &haystack);
                ScoredItem {
                    title: cwm.change.description.clone(),
                    payload: serde_json::to_value(&cwm).unwrap_or_default(),
                    score,
                }
            })
            .collect();

        Ok(Self::rank(scored, k, threshold))
    }

    async fn similar_patterns(
        &self,
        query_text: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredItem>> {
        let query_terms = tokenize(query_text);

        let scored = self
            .patterns
            .iter()
            .map(|note| {
                let haystack = format!("{} {}", note.term, note.note);
                let score = Self::overlap_score(&query_terms, &haystack);
                ScoredItem {
                    title: note.term.clone(),
                    payload: serde_json::to_value(note).unwrap_or_default(),
                    score,
                }
            })
            .collect();

        Ok(Self::rank(scored, k, threshold))
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainKnowledge;
    use crate::repo::models::{ChangeRecord, MetricMeasurement};
    use chrono::{Duration, Utc};
    use indexmap::IndexMap;

    fn provider() -> LexicalSimilarity {
        let repo = Arc::new(MemoryRepository::new());
        let now = Utc::now();
        for (days, category, description) in [
            (2i64, "BOGO", "BOGO sale on coins"),
            (4, "RTP Adjustments", "Adjusted RTP on classic slots"),
            (6, "Add Slot", "Launched jungle slot machine"),
        ] {
            let change = ChangeRecord::new(
                now - Duration::days(days),
                category.to_string(),
                description.to_string(),
                IndexMap::new(),
                vec![],
            );
            let metrics = vec![MetricMeasurement::new(
                change.change_id.clone(),
                "revenue".to_string(),
                100.0,
                105.0,
                change.timestamp,
            )];
            repo.add_change(change, metrics);
        }
        LexicalSimilarity::new(repo, DomainKnowledge::new().all_notes())
    }

    #[tokio::test]
    async fn test_similar_changes_ranked_and_filtered() {
        let provider = provider();
        let results = provider
            .similar_changes("BOGO sale performance", 5, 0.3)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(results[0].title.contains("BOGO"));
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.score >= 0.3));
    }

    #[tokio::test]
    async fn test_k_caps_results() {
        let provider = provider();
        let results = provider.similar_changes("slot machine sale", 1, 0.0).await.unwrap();
        assert!(results.len() <= 1);
    }

    #[tokio::test]
    async fn test_patterns_corpus() {
        let provider = provider();
        let results = provider
            .similar_patterns("improve retention with cooldown tuning", 3, 0.1)
            .await
            .unwrap();
        assert!(results.iter().any(|r| r.title == "Cooldown"));
    }

    #[tokio::test]
    async fn test_deterministic_ordering() {
        let provider = provider();
        let a = provider.similar_changes("slots", 5, 0.0).await.unwrap();
        let b = provider.similar_changes("slots", 5, 0.0).await.unwrap();
        let titles_a: Vec<_> = a.iter().map(|r| &r.title).collect();
        let titles_b: Vec<_> = b.iter().map(|r| &r.title).collect();
        assert_eq!(titles_a, titles_b);
    }
}
