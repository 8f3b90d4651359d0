//! Data models for the operational-change repository

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Expected direction of a change's impact on a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactDirection {
    Increase,
    Decrease,
    Neutral,
}

/// One tracked operational change (promotion, event, tuning adjustment)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change_id: String,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub description: String,
    /// Metric name -> expected direction at ship time
    pub expected_impact: IndexMap<String, ImpactDirection>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ChangeRecord {
    /// Create a new change with a generated id
    pub fn new(
        timestamp: DateTime<Utc>,
        category: String,
        description: String,
        expected_impact: IndexMap<String, ImpactDirection>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            change_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            category,
            description,
            expected_impact,
            tags,
        }
    }

    /// Content fingerprint for deduplication
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.category.as_bytes());
        hasher.update(b"|");
        hasher.update(self.description.as_bytes());
        hasher.update(b"|");
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// How many metrics this change was expected to move; used as a crude
    /// impact signal when hunting for confounders
    pub fn impact_breadth(&self) -> usize {
        self.expected_impact.len()
    }
}

/// A before/after measurement of one metric around one change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMeasurement {
    pub change_id: String,
    pub metric_name: String,
    pub before_value: f64,
    pub after_value: f64,
    /// Comparison window, e.g. "24h"
    pub window: String,
    pub measured_at: DateTime<Utc>,
}

impl MetricMeasurement {
    pub fn new(
        change_id: String,
        metric_name: String,
        before_value: f64,
        after_value: f64,
        measured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            change_id,
            metric_name,
            before_value,
            after_value,
            window: "24h".to_string(),
            measured_at,
        }
    }

    /// Percent change from before to after; +inf when starting from zero
    pub fn percent_change(&self) -> f64 {
        if self.before_value == 0.0 {
            return if self.after_value > 0.0 {
                f64::INFINITY
            } else {
                0.0
            };
        }
        (self.after_value - self.before_value) / self.before_value * 100.0
    }
}

/// Inclusive time range used by repository queries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A window of the given length ending at `end`
    pub fn ending_at(end: DateTime<Utc>, window: Duration) -> Self {
        Self {
            start: end - window,
            end,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(category: &str, description: &str) -> ChangeRecord {
        ChangeRecord::new(
            Utc::now(),
            category.to_string(),
            description.to_string(),
            IndexMap::new(),
            vec![],
        )
    }

    #[test]
    fn test_fingerprint_is_content_addressed() {
        let a = change("BOGO", "weekend coin sale");
        let mut b = a.clone();
        b.change_id = "different".to_string();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = change("BOGO", "weekday coin sale");
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_percent_change() {
        let m = MetricMeasurement::new("c1".into(), "revenue".into(), 100.0, 125.0, Utc::now());
        assert!((m.percent_change() - 25.0).abs() < 1e-9);

        let zero = MetricMeasurement::new("c1".into(), "revenue".into(), 0.0, 10.0, Utc::now());
        assert!(zero.percent_change().is_infinite());
    }

    #[test]
    fn test_time_range_contains() {
        let end = Utc::now();
        let range = TimeRange::ending_at(end, Duration::days(7));
        assert!(range.contains(end - Duration::days(3)));
        assert!(!range.contains(end - Duration::days(8)));
    }
}
