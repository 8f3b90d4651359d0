//! Rule-driven intent classification
//!
//! Every intent in the catalog is scored against the extracted entities and
//! the query text; the best score wins, with declaration order as the
//! deterministic tiebreak. A query always classifies: when the winner's
//! required entities are not fully satisfied the result degrades to
//! `general_query` instead of failing, trading precision for recall.

use crate::catalog::{IntentCatalog, IntentDefinition};
use crate::intent::models::{ClassifiedQuery, EntityMap};
use tracing::debug;

/// Weight of required-entity coverage in the intent score.
///
/// The weights are a fixed tuning decision, not configuration: coverage of
/// required entities dominates, each present optional entity adds a small
/// bonus (capped), and keyword affinity separates intents whose entity
/// signatures overlap.
const REQUIRED_WEIGHT: f32 = 0.6;
/// Bonus per present optional entity
const OPTIONAL_BONUS: f32 = 0.1;
/// Maximum total optional bonus
const OPTIONAL_BONUS_CAP: f32 = 0.2;
/// Weight of keyword affinity
const AFFINITY_WEIGHT: f32 = 0.2;
/// Confidence reported when classification degrades to the fallback intent
const FALLBACK_CONFIDENCE: f32 = 0.5;

/// The fallback intent id; its presence is enforced at catalog load
pub const FALLBACK_INTENT: &str = "general_query";

/// The intent classifier
pub struct IntentClassifier {
    catalog: IntentCatalog,
}

impl IntentClassifier {
    pub fn new(catalog: IntentCatalog) -> Self {
        Self { catalog }
    }

    /// Classify a query given its extracted entities
    ///
    /// Never fails: empty text and an empty entity map still produce a
    /// `general_query` classification.
    pub fn classify(&self, text: &str, entities: &EntityMap) -> ClassifiedQuery {
        let lowered = text.to_lowercase();

        let mut best: Option<(&IntentDefinition, f32)> = None;
        for intent in &self.catalog.intents {
            let score = Self::score(intent, entities, &lowered);
            debug!(intent = %intent.id, score, "Intent scored");

            // Strictly-greater keeps the earliest declared intent on ties.
            let replace = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };
            if replace {
                best = Some((intent, score));
            }
        }

        let (winner, score) = best.expect("intent catalog is never empty");

        if Self::required_satisfied(winner, entities) {
            return ClassifiedQuery {
                raw_text: text.to_string(),
                intent_id: winner.id.clone(),
                entities: entities.clone(),
                confidence: score.clamp(0.0, 1.0),
            };
        }

        debug!(
            winner = %winner.id,
            "Required entities unmet, falling back to {}",
            FALLBACK_INTENT
        );

        ClassifiedQuery {
            raw_text: text.to_string(),
            intent_id: FALLBACK_INTENT.to_string(),
            entities: entities.clone(),
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    fn score(intent: &IntentDefinition, entities: &EntityMap, lowered_text: &str) -> f32 {
        // Required coverage. An empty required set contributes nothing, so
        // the catch-all intent can only be reached through fallback.
        let required = if intent.required_entities.is_empty() {
            0.0
        } else {
            let present = intent
                .required_entities
                .iter()
                .filter(|t| entities.contains_key(*t))
                .count();
            present as f32 / intent.required_entities.len() as f32
        };

        let optional_present = intent
            .optional_entities
            .iter()
            .filter(|t| entities.contains_key(*t))
            .count();
        let optional = (optional_present as f32 * OPTIONAL_BONUS).min(OPTIONAL_BONUS_CAP);

        let affinity = if intent.keywords.is_empty() {
            0.0
        } else {
            let matched = intent
                .keywords
                .iter()
                .filter(|k| lowered_text.contains(k.to_lowercase().as_str()))
                .count();
            matched as f32 / intent.keywords.len() as f32
        };

        REQUIRED_WEIGHT * required + optional + AFFINITY_WEIGHT * affinity
    }

    fn required_satisfied(intent: &IntentDefinition, entities: &EntityMap) -> bool {
        intent
            .required_entities
            .iter()
            .all(|t| entities.contains_key(t))
    }
}
