//! Budget-constrained context selection
//!
//! Executes an intent's rules in priority order against the repository and
//! similarity providers, ranks each rule's candidates by its relevance
//! signal, and accepts items under the token budget. Provider failures and
//! timeouts are absorbed per rule: the rule yields nothing, a gap is
//! recorded, and the pipeline continues. A bundle is always produced.
//!
//! Once the cumulative budget saturates no further fetching happens;
//! remaining rules are only walked to record required-but-unmet gaps, which
//! bounds worst-case retrieval cost.
//!
//! Determinism: with identical inputs and an identical provider snapshot
//! the bundle's contents and ordering are reproducible. Final item order is
//! a stable sort by score, then rule priority, then insertion order.

use crate::catalog::RuleKind;
use crate::context::budget::{AcceptOutcome, BudgetTracker};
use crate::context::bundle::{ContextBundle, ContextGap, ContextItem, GapReason};
use crate::context::estimator::TokenEstimator;
use crate::context::rules::{ContextRule, RuleEngine};
use crate::domain::DomainKnowledge;
use crate::error::{InsightError, Result};
use crate::intent::models::{EntityMap, EntityType};
use crate::metrics::METRICS;
use crate::providers::{ChangeQuery, ChangeRepository, ChangeWithMetrics, SimilarityProvider};
use crate::repo::models::TimeRange;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Changes included per comparison target; keeps comparison payloads bounded
const COMPARISON_CHANGES_PER_TARGET: usize = 5;

/// A ranked candidate produced by one rule, before budget admission
struct Candidate {
    score: f32,
    payload: serde_json::Value,
}

enum SimilarKind {
    Changes,
    Patterns,
}

/// The context selector
pub struct ContextSelector {
    rules: Arc<RuleEngine>,
    repository: Arc<dyn ChangeRepository>,
    similarity: Arc<dyn SimilarityProvider>,
    domain: Arc<DomainKnowledge>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextSelector {
    pub fn new(
        rules: Arc<RuleEngine>,
        repository: Arc<dyn ChangeRepository>,
        similarity: Arc<dyn SimilarityProvider>,
        domain: Arc<DomainKnowledge>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        Self {
            rules,
            repository,
            similarity,
            domain,
            estimator,
        }
    }

    /// Assemble a bundle for the intent, anchored at the current time
    pub async fn select(
        &self,
        intent_id: &str,
        entities: &EntityMap,
        query_text: &str,
    ) -> ContextBundle {
        self.select_at(intent_id, entities, query_text, Utc::now())
            .await
    }

    /// Assemble a bundle anchored at an explicit reference time
    ///
    /// Time windows are computed relative to `as_of`, so two calls with the
    /// same anchor and provider snapshot produce identical bundles.
    pub async fn select_at(
        &self,
        intent_id: &str,
        entities: &EntityMap,
        query_text: &str,
        as_of: DateTime<Utc>,
    ) -> ContextBundle {
        let rules = self.rules.rules_for(intent_id);
        let mut tracker = BudgetTracker::new(self.rules.budget());
        let mut staged: Vec<(usize, ContextItem)> = Vec::new();
        let mut gaps: Vec<ContextGap> = Vec::new();

        for rule in rules {
            if tracker.is_saturated() {
                if rule.required {
                    gaps.push(ContextGap {
                        rule_type: rule.kind,
                        required: true,
                        reason: GapReason::BudgetExhausted,
                    });
                }
                continue;
            }

            let candidates = match self.resolve_rule(rule, entities, query_text, as_of).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(rule = %rule.kind, error = %e, "Provider failed, rule yields no items");
                    let label = rule.kind.to_string();
                    METRICS
                        .provider_failures
                        .with_label_values(&[label.as_str()])
                        .inc();
                    if rule.required {
                        gaps.push(ContextGap {
                            rule_type: rule.kind,
                            required: true,
                            reason: GapReason::ProviderUnavailable,
                        });
                    }
                    continue;
                }
            };

            let had_candidates = !candidates.is_empty();
            let mut ranked = candidates;
            // Stable sort keeps provider order for equal scores.
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
            ranked.truncate(rule.max_items);

            let mut accepted = 0usize;
            for candidate in ranked {
                let tokens = self.estimator.estimate_json(&candidate.payload);
                match tracker.offer(tokens) {
                    AcceptOutcome::Accepted => {
                        staged.push((
                            rule.priority,
                            ContextItem {
                                source_type: rule.kind,
                                payload: candidate.payload,
                                relevance_score: candidate.score,
                                token_estimate: tokens,
                            },
                        ));
                        accepted += 1;
                    }
                    AcceptOutcome::ItemTooLarge => {
                        debug!(rule = %rule.kind, tokens, "Item over per-item limit, skipped");
                    }
                    AcceptOutcome::Exhausted => {
                        METRICS.budget_saturations.inc();
                        debug!(rule = %rule.kind, "Budget saturated");
                        break;
                    }
                }
            }

            if accepted == 0 {
                let reason = if !had_candidates {
                    GapReason::NoEligibleItems
                } else if tracker.is_saturated() {
                    GapReason::BudgetExhausted
                } else {
                    // Candidates existed but every one was over the
                    // per-item limit.
                    GapReason::NoEligibleItems
                };
                gaps.push(ContextGap {
                    rule_type: rule.kind,
                    required: rule.required,
                    reason,
                });
            }
        }

        let mut indexed: Vec<(usize, usize, ContextItem)> = staged
            .into_iter()
            .enumerate()
            .map(|(seq, (priority, item))| (priority, seq, item))
            .collect();
        indexed.sort_by(|a, b| {
            b.2.relevance_score
                .total_cmp(&a.2.relevance_score)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });
        let items: Vec<ContextItem> = indexed.into_iter().map(|(_, _, item)| item).collect();

        let total = tracker.used();
        METRICS.bundle_items.observe(items.len() as f64);
        METRICS.bundle_tokens.observe(total as f64);

        debug!(
            intent = intent_id,
            items = items.len(),
            tokens = total,
            gaps = gaps.len(),
            "Bundle assembled"
        );

        ContextBundle {
            intent_id: intent_id.to_string(),
            items,
            total_token_estimate: total,
            gaps,
        }
    }

    /// Resolve one rule to its candidate list
    ///
    /// The single dispatch point over the closed set of rule kinds.
    async fn resolve_rule(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        query_text: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        match rule.kind {
            RuleKind::CategoryChanges => self.category_changes(rule, entities, as_of).await,
            RuleKind::CategoryPerformance => self.category_performance(rule, entities, as_of).await,
            RuleKind::MetricHistory => self.metric_history(rule, entities, as_of).await,
            RuleKind::TemporalData => self.temporal_data(rule, entities, as_of).await,
            RuleKind::ComparisonData => self.comparison_data(rule, entities, as_of).await,
            RuleKind::ConfoundingFactors => self.confounding_factors(rule, as_of).await,
            RuleKind::DomainKnowledge => Ok(self.domain_knowledge(entities, query_text)),
            RuleKind::SimilarChanges => {
                self.similar(rule, query_text, SimilarKind::Changes).await
            }
            RuleKind::SimilarPatterns => {
                self.similar(rule, query_text, SimilarKind::Patterns).await
            }
        }
    }

    async fn category_changes(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let Some(category) = first_value(entities, EntityType::Category) else {
            return Ok(vec![]);
        };

        let range = self.range_for(rule, as_of);
        let changes = self
            .with_timeout(self.repository.query_changes(ChangeQuery {
                category: Some(category.to_string()),
                range: Some(range),
                limit: None,
            }))
            .await?;

        Ok(changes
            .into_iter()
            .map(|cwm| Candidate {
                score: recency_score(cwm.change.timestamp, &range),
                payload: json(&cwm),
            })
            .collect())
    }

    async fn category_performance(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let Some(category) = first_value(entities, EntityType::Category) else {
            return Ok(vec![]);
        };

        let range = self.range_for(rule, as_of);
        let changes = self
            .with_timeout(self.repository.query_changes(ChangeQuery {
                category: Some(category.to_string()),
                range: Some(range),
                limit: None,
            }))
            .await?;

        if changes.is_empty() {
            return Ok(vec![]);
        }

        let stats = metric_stats(&changes);
        Ok(vec![Candidate {
            score: 1.0,
            payload: serde_json::json!({
                "category": category,
                "window_days": range.duration().num_days(),
                "change_count": changes.len(),
                "metrics_stats": stats,
            }),
        }])
    }

    async fn metric_history(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let Some(metric) = first_value(entities, EntityType::Metric) else {
            return Ok(vec![]);
        };

        let range = self.range_for(rule, as_of);
        let points = self
            .with_timeout(self.repository.metric_history(metric, range))
            .await?;

        if points.is_empty() {
            return Ok(vec![]);
        }

        // One series item; max_items caps the number of points, keeping the
        // most recent end of the history.
        let keep = points.len().saturating_sub(rule.max_items);
        let series: Vec<serde_json::Value> = points[keep..]
            .iter()
            .map(|m| {
                serde_json::json!({
                    "change_id": m.change_id,
                    "measured_at": m.measured_at.to_rfc3339(),
                    "before_value": m.before_value,
                    "after_value": m.after_value,
                    "percent_change": m.percent_change().is_finite().then(|| m.percent_change()),
                })
            })
            .collect();

        Ok(vec![Candidate {
            score: 1.0,
            payload: serde_json::json!({
                "metric": metric,
                "window_days": range.duration().num_days(),
                "points": series,
            }),
        }])
    }

    async fn temporal_data(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        if !entities.contains_key(&EntityType::TimePeriod) {
            return Ok(vec![]);
        }

        let before = rule.window_before.unwrap_or(self.rules.default_window());
        let after = rule.window_after.unwrap_or_else(Duration::zero);
        let range = TimeRange::new(as_of - before, as_of + after);

        let changes = self
            .with_timeout(self.repository.query_changes(ChangeQuery {
                category: None,
                range: Some(range),
                limit: None,
            }))
            .await?;

        Ok(changes
            .into_iter()
            .map(|cwm| Candidate {
                score: recency_score(cwm.change.timestamp, &range),
                payload: json(&cwm),
            })
            .collect())
    }

    async fn comparison_data(
        &self,
        rule: &ContextRule,
        entities: &EntityMap,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let Some(targets) = entities.get(&EntityType::ComparisonTargets) else {
            return Ok(vec![]);
        };

        let range = self.range_for(rule, as_of);
        let mut candidates = Vec::with_capacity(targets.values.len());

        // One candidate per target, in the order the targets appeared in
        // the query; equal scores keep that order through the stable sort.
        for target in &targets.values {
            let changes = self
                .with_timeout(self.repository.query_changes(ChangeQuery {
                    category: Some(target.clone()),
                    range: Some(range),
                    limit: None,
                }))
                .await?;

            let stats = metric_stats(&changes);
            // Compact change summaries; the metric detail is already in the
            // aggregated stats and full payloads would blow the per-item cap.
            let recent: Vec<serde_json::Value> = changes
                .iter()
                .rev()
                .take(COMPARISON_CHANGES_PER_TARGET)
                .map(|cwm| {
                    serde_json::json!({
                        "change_id": cwm.change.change_id,
                        "timestamp": cwm.change.timestamp.to_rfc3339(),
                        "description": cwm.change.description,
                    })
                })
                .collect();

            candidates.push(Candidate {
                score: 1.0,
                payload: serde_json::json!({
                    "target": target,
                    "change_count": changes.len(),
                    "recent_changes": recent,
                    "metrics_stats": stats,
                }),
            });
        }

        Ok(candidates)
    }

    async fn confounding_factors(
        &self,
        rule: &ContextRule,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Candidate>> {
        let range = self.range_for(rule, as_of);
        let changes = self
            .with_timeout(self.repository.query_changes(ChangeQuery {
                category: None,
                range: Some(range),
                limit: None,
            }))
            .await?;

        // Breadth of expected impact as a crude confounder signal, the
        // wider the blast radius the higher it ranks.
        Ok(changes
            .into_iter()
            .map(|cwm| {
                let breadth = cwm.change.impact_breadth();
                Candidate {
                    score: (breadth as f32 / 5.0).min(1.0),
                    payload: json(&cwm),
                }
            })
            .collect())
    }

    fn domain_knowledge(&self, entities: &EntityMap, query_text: &str) -> Vec<Candidate> {
        self.domain
            .notes_for_query(query_text, entities)
            .into_iter()
            .map(|note| Candidate {
                score: 1.0,
                payload: json(&note),
            })
            .collect()
    }

    async fn similar(
        &self,
        rule: &ContextRule,
        query_text: &str,
        kind: SimilarKind,
    ) -> Result<Vec<Candidate>> {
        let threshold = rule.similarity_threshold;
        let hits = match kind {
            SimilarKind::Changes => {
                self.with_timeout(self.similarity.similar_changes(
                    query_text,
                    rule.max_items,
                    threshold,
                ))
                .await?
            }
            SimilarKind::Patterns => {
                self.with_timeout(self.similarity.similar_patterns(
                    query_text,
                    rule.max_items,
                    threshold,
                ))
                .await?
            }
        };

        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .map(|hit| Candidate {
                score: hit.score,
                payload: serde_json::json!({
                    "title": hit.title,
                    "data": hit.payload,
                }),
            })
            .collect())
    }

    fn range_for(&self, rule: &ContextRule, as_of: DateTime<Utc>) -> TimeRange {
        let window = rule.time_window.unwrap_or(self.rules.default_window());
        TimeRange::ending_at(as_of, window)
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.rules.provider_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(InsightError::ProviderTimeout(timeout.as_millis() as u64)),
        }
    }
}

fn first_value(entities: &EntityMap, entity_type: EntityType) -> Option<&str> {
    entities.get(&entity_type).and_then(|e| e.first())
}

/// Recency in [0, 1]: 1.0 at the end of the range, 0.0 at its start
fn recency_score(at: DateTime<Utc>, range: &TimeRange) -> f32 {
    let span = range.duration().num_seconds().max(1);
    let age = (range.end - at).num_seconds().clamp(0, span);
    1.0 - (age as f32 / span as f32)
}

/// Average percent change per metric across a change set
fn metric_stats(changes: &[ChangeWithMetrics]) -> IndexMap<String, serde_json::Value> {
    let mut sums: IndexMap<String, (f64, usize)> = IndexMap::new();

    for cwm in changes {
        for m in &cwm.metrics {
            let pct = m.percent_change();
            if !pct.is_finite() {
                continue;
            }
            let entry = sums.entry(m.metric_name.clone()).or_insert((0.0, 0));
            entry.0 += pct;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(metric, (sum, count))| {
            (
                metric,
                serde_json::json!({
                    "average_percent_change": sum / count as f64,
                    "samples": count,
                }),
            )
        })
        .collect()
}

fn json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalogs;
    use crate::intent::models::Entity;
    use crate::providers::ScoredItem;
    use crate::repo::models::{ChangeRecord, MetricMeasurement};
    use crate::repo::MemoryRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entities_with(entity_type: EntityType, values: &[&str]) -> EntityMap {
        let mut map = EntityMap::new();
        map.insert(
            entity_type,
            Entity::new(entity_type, values.iter().map(|v| v.to_string()).collect()),
        );
        map
    }

    fn seeded_repo(as_of: DateTime<Utc>) -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        for i in 0..12i64 {
            let timestamp = as_of - Duration::days(i + 1);
            let mut impact = indexmap::IndexMap::new();
            impact.insert(
                "revenue".to_string(),
                crate::repo::models::ImpactDirection::Increase,
            );
            let change = ChangeRecord::new(
                timestamp,
                "BOGO".to_string(),
                format!("BOGO sale number {}", i),
                impact,
                vec![],
            );
            let metrics = vec![MetricMeasurement::new(
                change.change_id.clone(),
                "revenue".to_string(),
                100.0,
                110.0,
                timestamp,
            )];
            repo.add_change(change, metrics);
        }
        repo
    }

    /// Similarity provider that always fails
    struct FailingSimilarity;

    #[async_trait]
    impl SimilarityProvider for FailingSimilarity {
        async fn similar_changes(&self, _: &str, _: usize, _: f32) -> Result<Vec<ScoredItem>> {
            Err(InsightError::Provider("search backend down".to_string()))
        }

        async fn similar_patterns(&self, _: &str, _: usize, _: f32) -> Result<Vec<ScoredItem>> {
            Err(InsightError::Provider("search backend down".to_string()))
        }
    }

    /// Similarity provider that counts calls and returns nothing
    struct CountingSimilarity {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SimilarityProvider for CountingSimilarity {
        async fn similar_changes(&self, _: &str, _: usize, _: f32) -> Result<Vec<ScoredItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn similar_patterns(&self, _: &str, _: usize, _: f32) -> Result<Vec<ScoredItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn selector_with(
        repo: Arc<MemoryRepository>,
        similarity: Arc<dyn SimilarityProvider>,
    ) -> ContextSelector {
        let catalogs = Catalogs::builtin().unwrap();
        let rules = Arc::new(RuleEngine::from_catalogs(&catalogs).unwrap());
        ContextSelector::new(
            rules,
            repo,
            similarity,
            Arc::new(DomainKnowledge::new()),
            Arc::new(crate::context::estimator::CharRatioEstimator::default()),
        )
    }

    fn default_selector(as_of: DateTime<Utc>) -> ContextSelector {
        let repo = seeded_repo(as_of);
        let similarity = Arc::new(crate::providers::lexical::LexicalSimilarity::new(
            repo.clone(),
            DomainKnowledge::new().all_notes(),
        ));
        selector_with(repo, similarity)
    }

    #[tokio::test]
    async fn test_category_analysis_bundle_has_required_sources() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        let bundle = selector
            .select_at(
                "category_analysis",
                &entities,
                "How do BOGO offers perform?",
                as_of,
            )
            .await;

        // Each required rule either contributed an item or recorded a gap.
        for kind in [RuleKind::CategoryChanges, RuleKind::CategoryPerformance] {
            let has_item = bundle.items.iter().any(|i| i.source_type == kind);
            let has_gap = bundle.gaps.iter().any(|g| g.rule_type == kind);
            assert!(has_item || has_gap, "no item or gap for {}", kind);
        }
        assert!(bundle
            .items
            .iter()
            .any(|i| i.source_type == RuleKind::CategoryChanges));
    }

    #[tokio::test]
    async fn test_budget_invariant_holds() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        let bundle = selector
            .select_at("category_analysis", &entities, "BOGO performance", as_of)
            .await;

        let budget = selector.rules.budget();
        assert!(bundle.total_token_estimate <= budget.available());
        for item in &bundle.items {
            assert!(item.token_estimate <= budget.per_item_limit);
        }
        assert_eq!(
            bundle.total_token_estimate,
            bundle.items.iter().map(|i| i.token_estimate).sum::<usize>()
        );
    }

    #[tokio::test]
    async fn test_max_items_caps_ranked_candidates() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        // 12 eligible BOGO changes, category_changes rule caps at 10.
        let bundle = selector
            .select_at("category_analysis", &entities, "BOGO", as_of)
            .await;

        let changes: Vec<&ContextItem> = bundle
            .items
            .iter()
            .filter(|i| i.source_type == RuleKind::CategoryChanges)
            .collect();
        assert_eq!(changes.len(), 10);

        // The 10 kept are the most recent, i.e. the highest recency scores.
        let min_kept = changes
            .iter()
            .map(|i| i.relevance_score)
            .fold(f32::INFINITY, f32::min);
        assert!(min_kept > 0.0);
    }

    #[tokio::test]
    async fn test_select_is_idempotent() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        let a = selector
            .select_at("category_analysis", &entities, "BOGO results", as_of)
            .await;
        let b = selector
            .select_at("category_analysis", &entities, "BOGO results", as_of)
            .await;

        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn test_rule_ordering_law() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        let bundle = selector
            .select_at("category_analysis", &entities, "BOGO", as_of)
            .await;

        let rules = selector.rules.rules_for("category_analysis");
        let priority_of = |kind: RuleKind| {
            rules
                .iter()
                .find(|r| r.kind == kind)
                .map(|r| r.priority)
                .unwrap()
        };

        // For equal scores, a higher-priority rule's items never appear
        // after a lower-priority rule's items.
        for pair in bundle.items.windows(2) {
            if (pair[0].relevance_score - pair[1].relevance_score).abs() < f32::EPSILON {
                assert!(priority_of(pair[0].source_type) <= priority_of(pair[1].source_type));
            }
        }
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_gap_not_error() {
        let as_of = Utc::now();
        let repo = seeded_repo(as_of);
        let selector = selector_with(repo, Arc::new(FailingSimilarity));

        // recommendation's similar_changes rule is required.
        let entities = entities_with(EntityType::Objective, &["improve retention"]);
        let bundle = selector
            .select_at("recommendation", &entities, "how can we improve retention", as_of)
            .await;

        let gap = bundle
            .gaps
            .iter()
            .find(|g| g.rule_type == RuleKind::SimilarChanges)
            .expect("failed provider should record a gap");
        assert!(gap.required);
        assert_eq!(gap.reason, GapReason::ProviderUnavailable);
    }

    #[tokio::test]
    async fn test_required_rule_with_no_data_records_gap() {
        let as_of = Utc::now();
        // Empty repository: category rules find nothing.
        let repo = Arc::new(MemoryRepository::new());
        let similarity = Arc::new(crate::providers::lexical::LexicalSimilarity::new(
            repo.clone(),
            vec![],
        ));
        let selector = selector_with(repo, similarity);
        let entities = entities_with(EntityType::Category, &["BOGO"]);

        let bundle = selector
            .select_at("category_analysis", &entities, "BOGO", as_of)
            .await;

        let gap = bundle
            .gaps
            .iter()
            .find(|g| g.rule_type == RuleKind::CategoryChanges)
            .unwrap();
        assert!(gap.required);
        assert_eq!(gap.reason, GapReason::NoEligibleItems);
    }

    #[tokio::test]
    async fn test_saturation_stops_fetching() {
        let as_of = Utc::now();
        let repo = seeded_repo(as_of);
        let counting = Arc::new(CountingSimilarity {
            calls: AtomicUsize::new(0),
        });

        // A budget so small the first category_changes item saturates it;
        // similar_changes (last rule) must not be fetched at all.
        let mut catalogs = Catalogs::builtin().unwrap();
        catalogs.rules.default_settings.token_limits = crate::catalog::TokenLimits {
            max_total_tokens: 50,
            reserved_tokens: 10,
            per_item_limit: 600,
        };
        let rules = RuleEngine::from_catalogs(&catalogs).unwrap();

        let selector = ContextSelector::new(
            Arc::new(rules),
            repo,
            counting.clone(),
            Arc::new(DomainKnowledge::new()),
            Arc::new(crate::context::estimator::CharRatioEstimator::default()),
        );

        let entities = entities_with(EntityType::Category, &["BOGO"]);
        let bundle = selector
            .select_at("category_analysis", &entities, "BOGO", as_of)
            .await;

        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        // The required category_performance rule behind the saturation
        // point is recorded as a budget gap.
        assert!(bundle
            .gaps
            .iter()
            .any(|g| g.rule_type == RuleKind::CategoryPerformance
                && g.reason == GapReason::BudgetExhausted));
    }

    #[tokio::test]
    async fn test_comparison_targets_keep_query_order() {
        let as_of = Utc::now();
        let repo = Arc::new(MemoryRepository::new());
        for (category, desc) in [
            ("Pearly Rush Event", "Pearly Rush round"),
            ("Dealers Edge Event", "Dealers Edge round"),
        ] {
            let change = ChangeRecord::new(
                as_of - Duration::days(3),
                category.to_string(),
                desc.to_string(),
                indexmap::IndexMap::new(),
                vec![],
            );
            repo.add_change(change, vec![]);
        }
        let similarity = Arc::new(crate::providers::lexical::LexicalSimilarity::new(
            repo.clone(),
            vec![],
        ));
        let selector = selector_with(repo, similarity);

        let entities = entities_with(
            EntityType::ComparisonTargets,
            &["Pearly Rush Event", "Dealers Edge Event"],
        );
        let bundle = selector
            .select_at(
                "comparative_analysis",
                &entities,
                "Compare Pearly Rush and Dealers Edge events",
                as_of,
            )
            .await;

        let targets: Vec<&str> = bundle
            .items
            .iter()
            .filter(|i| i.source_type == RuleKind::ComparisonData)
            .filter_map(|i| i.payload["target"].as_str())
            .collect();
        assert_eq!(targets, vec!["Pearly Rush Event", "Dealers Edge Event"]);
    }

    #[tokio::test]
    async fn test_unknown_intent_still_produces_bundle() {
        let as_of = Utc::now();
        let selector = default_selector(as_of);

        let bundle = selector
            .select_at("no_such_intent", &EntityMap::new(), "anything", as_of)
            .await;

        assert_eq!(bundle.intent_id, "no_such_intent");
        assert!(bundle.total_token_estimate <= selector.rules.budget().available());
    }
}
