//! The assembled context bundle handed to generation

use crate::catalog::RuleKind;
use crate::intent::models::EntityMap;
use serde::{Deserialize, Serialize};

/// One accepted context item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub source_type: RuleKind,
    pub payload: serde_json::Value,
    pub relevance_score: f32,
    pub token_estimate: usize,
}

/// Why a rule contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    NoEligibleItems,
    ProviderUnavailable,
    BudgetExhausted,
}

/// A recorded gap: a rule that yielded no accepted items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextGap {
    pub rule_type: RuleKind,
    pub required: bool,
    pub reason: GapReason,
}

/// The terminal output of the selection pipeline
///
/// Consumed and discarded per query; nothing here is persisted. All
/// timestamps inside payloads are RFC 3339 strings, so the serialized form
/// never carries native date objects across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub intent_id: String,
    pub items: Vec<ContextItem>,
    pub total_token_estimate: usize,
    pub gaps: Vec<ContextGap>,
}

impl ContextBundle {
    /// Serialized form for the generation collaborator:
    /// `{intent, entities, context_items, total_tokens, gaps}`
    pub fn to_payload(&self, entities: &EntityMap) -> serde_json::Value {
        serde_json::json!({
            "intent": self.intent_id,
            "entities": entities,
            "context_items": self.items,
            "total_tokens": self.total_token_estimate,
            "gaps": self.gaps,
        })
    }

    /// Gaps for rules that were marked required
    pub fn required_gaps(&self) -> impl Iterator<Item = &ContextGap> {
        self.gaps.iter().filter(|g| g.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::models::{Entity, EntityType};

    #[test]
    fn test_payload_shape() {
        let bundle = ContextBundle {
            intent_id: "category_analysis".to_string(),
            items: vec![ContextItem {
                source_type: RuleKind::CategoryChanges,
                payload: serde_json::json!({"change": {"timestamp": "2026-08-01T00:00:00Z"}}),
                relevance_score: 0.9,
                token_estimate: 40,
            }],
            total_token_estimate: 40,
            gaps: vec![ContextGap {
                rule_type: RuleKind::CategoryPerformance,
                required: true,
                reason: GapReason::NoEligibleItems,
            }],
        };

        let mut entities = EntityMap::new();
        entities.insert(
            EntityType::Category,
            Entity::new(EntityType::Category, vec!["BOGO".to_string()]),
        );

        let payload = bundle.to_payload(&entities);
        assert_eq!(payload["intent"], "category_analysis");
        assert_eq!(payload["total_tokens"], 40);
        assert_eq!(
            payload["context_items"][0]["source_type"],
            "category_changes"
        );
        assert_eq!(payload["gaps"][0]["reason"], "no_eligible_items");
        assert_eq!(payload["entities"]["category"]["values"][0], "BOGO");
    }

    #[test]
    fn test_required_gaps_filter() {
        let bundle = ContextBundle {
            intent_id: "x".to_string(),
            items: vec![],
            total_token_estimate: 0,
            gaps: vec![
                ContextGap {
                    rule_type: RuleKind::DomainKnowledge,
                    required: false,
                    reason: GapReason::NoEligibleItems,
                },
                ContextGap {
                    rule_type: RuleKind::CategoryChanges,
                    required: true,
                    reason: GapReason::ProviderUnavailable,
                },
            ],
        };

        let required: Vec<_> = bundle.required_gaps().collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].rule_type, RuleKind::CategoryChanges);
    }
}
