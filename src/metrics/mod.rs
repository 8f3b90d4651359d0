//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Pipeline metrics
    pub queries_total: CounterVec,
    pub classification_fallbacks: Counter,
    pub provider_failures: CounterVec,
    pub budget_saturations: Counter,
    pub bundle_items: Histogram,
    pub bundle_tokens: Histogram,

    // Generation metrics
    pub generation_requests: CounterVec,

    // API metrics
    pub request_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let queries_total = register_counter_vec_with_registry!(
            Opts::new("insight_queries_total", "Total queries processed"),
            &["intent"],
            registry
        )?;

        let classification_fallbacks = register_counter_with_registry!(
            Opts::new(
                "insight_classification_fallbacks_total",
                "Queries that degraded to the general_query intent"
            ),
            registry
        )?;

        let provider_failures = register_counter_vec_with_registry!(
            Opts::new(
                "insight_provider_failures_total",
                "Provider errors or timeouts absorbed per rule"
            ),
            &["rule"],
            registry
        )?;

        let budget_saturations = register_counter_with_registry!(
            Opts::new(
                "insight_budget_saturations_total",
                "Selections that hit the token budget cap"
            ),
            registry
        )?;

        let bundle_items = register_histogram_with_registry!(
            "insight_bundle_items",
            "Context items per bundle",
            registry
        )?;

        let bundle_tokens = register_histogram_with_registry!(
            "insight_bundle_tokens",
            "Estimated tokens per bundle",
            registry
        )?;

        let generation_requests = register_counter_vec_with_registry!(
            Opts::new(
                "insight_generation_requests_total",
                "Generation service calls"
            ),
            &["status"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "insight_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            registry
        )?;

        Ok(Self {
            registry,
            queries_total,
            classification_fallbacks,
            provider_failures,
            budget_saturations,
            bundle_items,
            bundle_tokens,
            generation_requests,
            request_duration,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialize() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_export_contains_registered_series() {
        METRICS
            .queries_total
            .with_label_values(&["general_query"])
            .inc();
        let text = METRICS.export();
        assert!(text.contains("insight_queries_total"));
    }
}
