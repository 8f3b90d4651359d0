//! The per-query insight pipeline
//!
//! Wires extraction, classification, rule lookup, and context selection
//! behind one façade: query text in, classified query plus context bundle
//! out, with optional generation on top. All configuration is immutable
//! after construction; per-query state is owned by the call, so any number
//! of queries can run concurrently on one engine.

use crate::catalog::Catalogs;
use crate::context::bundle::ContextBundle;
use crate::context::estimator::{CharRatioEstimator, TokenEstimator};
use crate::context::rules::RuleEngine;
use crate::context::selector::ContextSelector;
use crate::domain::DomainKnowledge;
use crate::error::Result;
use crate::generation::{render_query_prompt, GenerationService};
use crate::intent::classifier::IntentClassifier;
use crate::intent::extractor::EntityExtractor;
use crate::intent::models::{ClassifiedQuery, EntityMap, EntityType};
use crate::intent::FALLBACK_INTENT;
use crate::metrics::METRICS;
use crate::providers::{ChangeRepository, SimilarityProvider};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Classification results cached per query text
const CLASSIFY_CACHE_SIZE: u64 = 1024;

/// Full pipeline output for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightResponse {
    pub classified: ClassifiedQuery,
    pub bundle: ContextBundle,
    /// Generated answer, or a data-only summary when no generation service
    /// is configured or the call failed
    pub insight: String,
    pub generated: bool,
}

/// The insight engine
pub struct InsightEngine {
    extractor: EntityExtractor,
    classifier: IntentClassifier,
    selector: ContextSelector,
    generation: Option<Arc<dyn GenerationService>>,
    classify_cache: Cache<String, ClassifiedQuery>,
}

impl InsightEngine {
    /// Build the engine from validated catalogs and providers
    pub fn new(
        catalogs: Arc<Catalogs>,
        repository: Arc<dyn ChangeRepository>,
        similarity: Arc<dyn SimilarityProvider>,
        generation: Option<Arc<dyn GenerationService>>,
    ) -> Result<Self> {
        let extractor = EntityExtractor::new(&catalogs.entities)?;
        let classifier = IntentClassifier::new(catalogs.intents.clone());
        let rules = Arc::new(RuleEngine::from_catalogs(&catalogs)?);
        let estimator: Arc<dyn TokenEstimator> = Arc::new(CharRatioEstimator::default());
        let selector = ContextSelector::new(
            rules,
            repository,
            similarity,
            Arc::new(DomainKnowledge::new()),
            estimator,
        );

        Ok(Self {
            extractor,
            classifier,
            selector,
            generation,
            classify_cache: Cache::new(CLASSIFY_CACHE_SIZE),
        })
    }

    /// Classify a query; results are cached because classification is a
    /// pure function of the text and the immutable catalogs
    pub async fn classify(&self, text: &str) -> ClassifiedQuery {
        let text_owned = text.to_string();
        self.classify_cache
            .get_with(text_owned.clone(), async move {
                self.classify_uncached(&text_owned, &EntityMap::new())
            })
            .await
    }

    /// Classify with seed entities carried over from a prior turn;
    /// extraction augments the seed, it never overwrites it
    pub fn classify_with_seed(&self, text: &str, seed: &EntityMap) -> ClassifiedQuery {
        self.classify_uncached(text, seed)
    }

    fn classify_uncached(&self, text: &str, seed: &EntityMap) -> ClassifiedQuery {
        let entities = self.extractor.extract_with_seed(text, seed);
        let classified = self.classifier.classify(text, &entities);

        METRICS
            .queries_total
            .with_label_values(&[classified.intent_id.as_str()])
            .inc();
        if classified.intent_id == FALLBACK_INTENT {
            METRICS.classification_fallbacks.inc();
        }

        classified
    }

    /// Assemble the context bundle for a classified query
    pub async fn build_context(&self, classified: &ClassifiedQuery) -> ContextBundle {
        self.selector
            .select(
                &classified.intent_id,
                &classified.entities,
                &classified.raw_text,
            )
            .await
    }

    /// Assemble the context bundle anchored at an explicit time
    pub async fn build_context_at(
        &self,
        classified: &ClassifiedQuery,
        as_of: DateTime<Utc>,
    ) -> ContextBundle {
        self.selector
            .select_at(
                &classified.intent_id,
                &classified.entities,
                &classified.raw_text,
                as_of,
            )
            .await
    }

    /// Run the full pipeline: classify, select context, generate
    ///
    /// Generation failures degrade to a data-only summary; they never fail
    /// the query.
    pub async fn handle_query(&self, text: &str, seed: Option<&EntityMap>) -> InsightResponse {
        let classified = match seed {
            Some(seed) => self.classify_with_seed(text, seed),
            None => self.classify(text).await,
        };

        let bundle = self.build_context(&classified).await;

        info!(
            intent = %classified.intent_id,
            items = bundle.items.len(),
            tokens = bundle.total_token_estimate,
            "Query pipeline complete"
        );

        let (insight, generated) = match &self.generation {
            Some(service) => {
                let prompt = render_query_prompt(&classified, &bundle);
                match service.generate(&prompt).await {
                    Ok(text) => (text, true),
                    Err(e) => {
                        warn!(error = %e, "Generation failed, returning data summary");
                        (basic_insight(&classified, &bundle), false)
                    }
                }
            }
            None => (basic_insight(&classified, &bundle), false),
        };

        InsightResponse {
            classified,
            bundle,
            insight,
            generated,
        }
    }
}

/// Data-only summary used when no generation service answers
fn basic_insight(classified: &ClassifiedQuery, bundle: &ContextBundle) -> String {
    let mut lines = vec![format!(
        "Intent: {} ({} context items, ~{} tokens).",
        classified.intent_id,
        bundle.items.len(),
        bundle.total_token_estimate
    )];

    if let Some(entity) = classified.entities.get(&EntityType::Category) {
        lines.push(format!("Categories: {}.", entity.values.join(", ")));
    }
    if let Some(entity) = classified.entities.get(&EntityType::Metric) {
        lines.push(format!("Metrics: {}.", entity.values.join(", ")));
    }

    let required_gaps: Vec<String> = bundle
        .required_gaps()
        .map(|g| g.rule_type.to_string())
        .collect();
    if !required_gaps.is_empty() {
        lines.push(format!(
            "Missing required context: {}.",
            required_gaps.join(", ")
        ));
    }

    lines.push(
        "Configure a generation service for a narrative answer over this context.".to_string(),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::models::Entity;
    use crate::providers::lexical::LexicalSimilarity;
    use crate::repo::{seed_repository, MemoryRepository};

    fn engine() -> InsightEngine {
        let catalogs = Arc::new(Catalogs::builtin().unwrap());
        let repo = Arc::new(MemoryRepository::new());
        seed_repository(&repo, 40, 11, Utc::now());
        let similarity = Arc::new(LexicalSimilarity::new(
            repo.clone(),
            DomainKnowledge::new().all_notes(),
        ));
        InsightEngine::new(catalogs, repo, similarity, None).unwrap()
    }

    #[tokio::test]
    async fn test_full_pipeline_without_generation() {
        let engine = engine();
        let response = engine.handle_query("How do BOGO offers perform?", None).await;

        assert_eq!(response.classified.intent_id, "category_analysis");
        assert!(!response.generated);
        assert!(response.insight.contains("category_analysis"));
    }

    #[tokio::test]
    async fn test_classification_cache_returns_same_result() {
        let engine = engine();
        let a = engine.classify("How do BOGO offers perform?").await;
        let b = engine.classify("How do BOGO offers perform?").await;
        assert_eq!(a.intent_id, b.intent_id);
        assert_eq!(a.entities, b.entities);
    }

    #[tokio::test]
    async fn test_seed_entities_survive_followup() {
        let engine = engine();
        let mut seed = EntityMap::new();
        seed.insert(
            EntityType::Category,
            Entity::new(EntityType::Category, vec!["BOGO".to_string()]),
        );

        // A follow-up with no category of its own still classifies against
        // the carried-over category.
        let classified = engine.classify_with_seed("how is it performing?", &seed);
        assert_eq!(classified.intent_id, "category_analysis");
        assert_eq!(classified.entity_value(EntityType::Category), Some("BOGO"));
    }
}
