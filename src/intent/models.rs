//! Data models for query understanding

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of entity types the extractor recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Category,
    Metric,
    TimePeriod,
    Effect,
    Objective,
    ComparisonTargets,
    ContextFactors,
}

impl EntityType {
    /// All entity types, in catalog declaration order
    pub fn all() -> [EntityType; 7] {
        [
            EntityType::Category,
            EntityType::Metric,
            EntityType::TimePeriod,
            EntityType::Effect,
            EntityType::Objective,
            EntityType::ComparisonTargets,
            EntityType::ContextFactors,
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Category => "category",
            EntityType::Metric => "metric",
            EntityType::TimePeriod => "time_period",
            EntityType::Effect => "effect",
            EntityType::Objective => "objective",
            EntityType::ComparisonTargets => "comparison_targets",
            EntityType::ContextFactors => "context_factors",
        };
        f.write_str(s)
    }
}

/// An extracted entity
///
/// Values are always an ordered list in first-seen order, even when a single
/// occurrence was matched. Downstream code never branches on list-vs-scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub values: Vec<String>,
}

impl Entity {
    pub fn new(entity_type: EntityType, values: Vec<String>) -> Self {
        Self {
            entity_type,
            values,
        }
    }

    /// First value, if any
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(|v| v.as_str())
    }
}

/// Extracted entities keyed by type
///
/// An absent key means "not found"; there are no null entries. Insertion
/// order is preserved so serialized output is stable across runs.
pub type EntityMap = IndexMap<EntityType, Entity>;

/// The result of classifying one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedQuery {
    pub raw_text: String,
    pub intent_id: String,
    pub entities: EntityMap,
    pub confidence: f32,
}

impl ClassifiedQuery {
    /// Whether an entity of the given type was extracted
    pub fn has_entity(&self, entity_type: EntityType) -> bool {
        self.entities.contains_key(&entity_type)
    }

    /// First value of an entity type, if present
    pub fn entity_value(&self, entity_type: EntityType) -> Option<&str> {
        self.entities.get(&entity_type).and_then(|e| e.first())
    }
}
