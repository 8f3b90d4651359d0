//! External data-provider seams
//!
//! The selector only talks to these traits. Real deployments plug in a
//! database-backed repository and a vector-search service; the in-process
//! implementations here ([`crate::repo::MemoryRepository`] and
//! [`lexical::LexicalSimilarity`]) keep the pipeline runnable and testable
//! without either.

pub mod lexical;

use crate::error::Result;
use crate::repo::models::{ChangeRecord, MetricMeasurement, TimeRange};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Filter for change lookups; all fields optional
#[derive(Debug, Clone, Default)]
pub struct ChangeQuery {
    pub category: Option<String>,
    pub range: Option<TimeRange>,
    pub limit: Option<usize>,
}

/// A change joined with its metric measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeWithMetrics {
    pub change: ChangeRecord,
    pub metrics: Vec<MetricMeasurement>,
}

/// Queryable source of structured change/metric facts
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    /// Changes matching the filter, ordered by timestamp ascending
    async fn query_changes(&self, query: ChangeQuery) -> Result<Vec<ChangeWithMetrics>>;

    /// Measurement history for one metric inside a time range, ordered by
    /// measurement time ascending
    async fn metric_history(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<Vec<MetricMeasurement>>;
}

/// One similarity-search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub title: String,
    pub payload: serde_json::Value,
    pub score: f32,
}

/// Similarity-search provider over past changes and playbook patterns
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Top-k changes similar to the query text, scores descending,
    /// already filtered to `score >= threshold`
    async fn similar_changes(
        &self,
        query_text: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredItem>>;

    /// Top-k playbook patterns similar to the query text
    async fn similar_patterns(
        &self,
        query_text: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredItem>>;
}
