//! In-memory change repository with simple lookup indexes

use super::models::{ChangeRecord, MetricMeasurement, TimeRange};
use crate::error::Result;
use crate::providers::{ChangeQuery, ChangeRepository, ChangeWithMetrics};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    changes: Vec<ChangeRecord>,
    metrics_by_change: HashMap<String, Vec<MetricMeasurement>>,
    /// category -> indexes into `changes`
    category_index: HashMap<String, Vec<usize>>,
    fingerprints: HashSet<String>,
}

/// In-memory repository
///
/// Writes happen at startup (seeding) and through the API; queries take a
/// read lock only. Changes are kept in insertion order and sorted per query,
/// which is fine at the data volumes this store is meant for.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a change with its measurements; duplicate content is skipped
    ///
    /// Returns false when an identical change (by fingerprint) was already
    /// present.
    pub fn add_change(&self, change: ChangeRecord, metrics: Vec<MetricMeasurement>) -> bool {
        let mut inner = self.inner.write().expect("repository lock poisoned");

        if !inner.fingerprints.insert(change.fingerprint()) {
            debug!(change_id = %change.change_id, "Duplicate change skipped");
            return false;
        }

        let idx = inner.changes.len();
        inner
            .category_index
            .entry(change.category.clone())
            .or_default()
            .push(idx);
        inner
            .metrics_by_change
            .insert(change.change_id.clone(), metrics);
        inner.changes.push(change);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("repository lock poisoned").changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChangeRepository for MemoryRepository {
    async fn query_changes(&self, query: ChangeQuery) -> Result<Vec<ChangeWithMetrics>> {
        let inner = self.inner.read().expect("repository lock poisoned");

        let indexes: Vec<usize> = match &query.category {
            Some(category) => inner
                .category_index
                .get(category)
                .cloned()
                .unwrap_or_default(),
            None => (0..inner.changes.len()).collect(),
        };

        let mut results: Vec<ChangeWithMetrics> = indexes
            .into_iter()
            .map(|i| &inner.changes[i])
            .filter(|c| match &query.range {
                Some(range) => range.contains(c.timestamp),
                None => true,
            })
            .map(|c| ChangeWithMetrics {
                change: c.clone(),
                metrics: inner
                    .metrics_by_change
                    .get(&c.change_id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();

        // Chronological order with the change id as a stable tiebreak.
        results.sort_by(|a, b| {
            a.change
                .timestamp
                .cmp(&b.change.timestamp)
                .then_with(|| a.change.change_id.cmp(&b.change.change_id))
        });

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn metric_history(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<Vec<MetricMeasurement>> {
        let inner = self.inner.read().expect("repository lock poisoned");

        let mut points: Vec<MetricMeasurement> = inner
            .metrics_by_change
            .values()
            .flatten()
            .filter(|m| m.metric_name == metric && range.contains(m.measured_at))
            .cloned()
            .collect();

        points.sort_by(|a, b| {
            a.measured_at
                .cmp(&b.measured_at)
                .then_with(|| a.change_id.cmp(&b.change_id))
        });

        Ok(points)
    }
}
