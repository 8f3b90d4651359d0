//! Static catalogs: intents, entity types, and context-selection rules
//!
//! All three catalogs are loaded once at startup, validated as a whole, and
//! never mutated afterwards. Any malformed entry, dangling reference, or
//! non-positive limit is a fatal `Configuration` error; there is no partial
//! load. Built-in copies of the shipped catalog files are embedded so the
//! engine can run without a config directory (tests rely on this).

use crate::error::{InsightError, Result};
use crate::intent::models::EntityType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const BUILTIN_INTENTS: &str = include_str!("../../config/catalog/intents.json");
const BUILTIN_ENTITY_TYPES: &str = include_str!("../../config/catalog/entity_types.json");
const BUILTIN_SELECTION_RULES: &str = include_str!("../../config/catalog/selection_rules.json");

/// The closed set of context-source kinds a rule can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    CategoryChanges,
    CategoryPerformance,
    MetricHistory,
    TemporalData,
    ComparisonData,
    ConfoundingFactors,
    DomainKnowledge,
    SimilarChanges,
    SimilarPatterns,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleKind::CategoryChanges => "category_changes",
            RuleKind::CategoryPerformance => "category_performance",
            RuleKind::MetricHistory => "metric_history",
            RuleKind::TemporalData => "temporal_data",
            RuleKind::ComparisonData => "comparison_data",
            RuleKind::ConfoundingFactors => "confounding_factors",
            RuleKind::DomainKnowledge => "domain_knowledge",
            RuleKind::SimilarChanges => "similar_changes",
            RuleKind::SimilarPatterns => "similar_patterns",
        };
        f.write_str(s)
    }
}

/// One entity type's recognition configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityTypeDef {
    /// Canonical values; matching any of them (case-insensitive) yields the value itself
    #[serde(default)]
    pub values: Vec<String>,
    /// Surface phrase -> canonical value
    #[serde(default)]
    pub aliases: IndexMap<String, String>,
    /// Regex patterns; matches keep the (trimmed) surface span
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Trigger phrases; when non-empty, the type is only extracted if one is present
    #[serde(default)]
    pub cues: Vec<String>,
}

impl EntityTypeDef {
    /// Whether this type normalizes matches to a closed enumeration
    pub fn has_enumeration(&self) -> bool {
        !self.values.is_empty() || !self.aliases.is_empty()
    }
}

/// Entity-type catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCatalog {
    pub entity_types: IndexMap<EntityType, EntityTypeDef>,
}

/// One intent's definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub required_entities: Vec<EntityType>,
    #[serde(default)]
    pub optional_entities: Vec<EntityType>,
    /// Intent-indicative vocabulary used for keyword affinity scoring
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    /// Context-source kinds this intent expects, in priority order
    #[serde(default)]
    pub context_requirements: Vec<RuleKind>,
}

/// Intent catalog; declaration order is the classifier tiebreak order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCatalog {
    pub intents: Vec<IntentDefinition>,
}

impl IntentCatalog {
    pub fn get(&self, id: &str) -> Option<&IntentDefinition> {
        self.intents.iter().find(|i| i.id == id)
    }
}

/// Raw rule entry as declared in the selection-rules catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub description: String,
    #[serde(default)]
    pub time_window: Option<String>,
    #[serde(default)]
    pub time_window_before: Option<String>,
    #[serde(default)]
    pub time_window_after: Option<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub required: bool,
}

/// One intent's rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRuleSet {
    pub priority_order: Vec<RuleKind>,
    pub rules: Vec<RuleSpec>,
}

/// Token budget limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLimits {
    pub max_total_tokens: usize,
    pub reserved_tokens: usize,
    pub per_item_limit: usize,
}

/// Time defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeDefaults {
    pub default_window: String,
}

/// Similarity defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityDefaults {
    pub default_threshold: f32,
}

/// Selection-wide defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSettings {
    pub token_limits: TokenLimits,
    pub time: TimeDefaults,
    pub similarity: SimilarityDefaults,
    pub provider_timeout_ms: u64,
}

/// Selection-rules catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRulesCatalog {
    pub default_settings: DefaultSettings,
    pub context_rules: IndexMap<String, IntentRuleSet>,
}

/// All three catalogs, validated together
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub entities: EntityCatalog,
    pub intents: IntentCatalog,
    pub rules: SelectionRulesCatalog,
}

impl Catalogs {
    /// Load from a catalog directory (intents.json, entity_types.json, selection_rules.json)
    pub fn load(dir: &str) -> Result<Self> {
        let dir = Path::new(dir);
        let intents = read_json::<IntentCatalog>(&dir.join("intents.json"))?;
        let entities = read_json::<EntityCatalog>(&dir.join("entity_types.json"))?;
        let rules = read_json::<SelectionRulesCatalog>(&dir.join("selection_rules.json"))?;

        let catalogs = Self {
            entities,
            intents,
            rules,
        };
        catalogs.validate()?;

        info!(
            intents = catalogs.intents.intents.len(),
            entity_types = catalogs.entities.entity_types.len(),
            "Catalogs loaded"
        );

        Ok(catalogs)
    }

    /// Built-in catalogs embedded at compile time
    pub fn builtin() -> Result<Self> {
        let intents: IntentCatalog = serde_json::from_str(BUILTIN_INTENTS)
            .map_err(|e| InsightError::Configuration(format!("builtin intents: {}", e)))?;
        let entities: EntityCatalog = serde_json::from_str(BUILTIN_ENTITY_TYPES)
            .map_err(|e| InsightError::Configuration(format!("builtin entity types: {}", e)))?;
        let rules: SelectionRulesCatalog = serde_json::from_str(BUILTIN_SELECTION_RULES)
            .map_err(|e| InsightError::Configuration(format!("builtin selection rules: {}", e)))?;

        let catalogs = Self {
            entities,
            intents,
            rules,
        };
        catalogs.validate()?;
        Ok(catalogs)
    }

    /// Cross-catalog validation; any failure aborts startup
    pub fn validate(&self) -> Result<()> {
        if self.intents.intents.is_empty() {
            return Err(InsightError::Configuration(
                "intent catalog is empty".to_string(),
            ));
        }

        if self.intents.get("general_query").is_none() {
            return Err(InsightError::Configuration(
                "intent catalog must declare the general_query fallback".to_string(),
            ));
        }

        // Every intent needs a rule set, and every rule set must reference a
        // declared intent.
        for intent in &self.intents.intents {
            if !self.rules.context_rules.contains_key(&intent.id) {
                return Err(InsightError::Configuration(format!(
                    "no selection rules declared for intent '{}'",
                    intent.id
                )));
            }
        }
        for intent_id in self.rules.context_rules.keys() {
            if self.intents.get(intent_id).is_none() {
                return Err(InsightError::Configuration(format!(
                    "selection rules reference unknown intent '{}'",
                    intent_id
                )));
            }
        }

        for (intent_id, rule_set) in &self.rules.context_rules {
            self.validate_rule_set(intent_id, rule_set)?;
        }

        // Entity regex patterns must compile.
        for (entity_type, def) in &self.entities.entity_types {
            for pattern in &def.patterns {
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        InsightError::Configuration(format!(
                            "invalid pattern for entity type '{}': {}",
                            entity_type, e
                        ))
                    })?;
            }
        }

        let limits = &self.rules.default_settings.token_limits;
        if limits.reserved_tokens >= limits.max_total_tokens {
            return Err(InsightError::Configuration(format!(
                "reserved_tokens ({}) must be below max_total_tokens ({})",
                limits.reserved_tokens, limits.max_total_tokens
            )));
        }
        if limits.per_item_limit == 0 {
            return Err(InsightError::Configuration(
                "per_item_limit must be positive".to_string(),
            ));
        }

        parse_time_window(&self.rules.default_settings.time.default_window)?;

        Ok(())
    }

    fn validate_rule_set(&self, intent_id: &str, rule_set: &IntentRuleSet) -> Result<()> {
        let mut seen = Vec::new();
        for rule in &rule_set.rules {
            if seen.contains(&rule.kind) {
                return Err(InsightError::Configuration(format!(
                    "duplicate rule type '{}' for intent '{}'",
                    rule.kind, intent_id
                )));
            }
            seen.push(rule.kind);

            if let Some(max_items) = rule.max_items {
                if max_items == 0 {
                    return Err(InsightError::Configuration(format!(
                        "rule '{}' for intent '{}' declares max_items 0",
                        rule.kind, intent_id
                    )));
                }
            }

            for window in [&rule.time_window, &rule.time_window_before, &rule.time_window_after]
                .into_iter()
                .flatten()
            {
                parse_time_window(window)?;
            }

            if let Some(threshold) = rule.similarity_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(InsightError::Configuration(format!(
                        "rule '{}' for intent '{}' declares similarity_threshold {} outside [0, 1]",
                        rule.kind, intent_id, threshold
                    )));
                }
            }
        }

        for kind in &rule_set.priority_order {
            if !seen.contains(kind) {
                return Err(InsightError::Configuration(format!(
                    "priority_order for intent '{}' references undeclared rule '{}'",
                    intent_id, kind
                )));
            }
        }
        for kind in &seen {
            if !rule_set.priority_order.contains(kind) {
                return Err(InsightError::Configuration(format!(
                    "rule '{}' for intent '{}' is missing from priority_order",
                    kind, intent_id
                )));
            }
        }

        Ok(())
    }
}

/// Parse a "N unit" time-window spec into a duration
///
/// Months are approximated as 30 days and years as 365.
pub fn parse_time_window(spec: &str) -> Result<chrono::Duration> {
    let mut parts = spec.split_whitespace();
    let (number, unit) = match (parts.next(), parts.next(), parts.next()) {
        (Some(n), Some(u), None) => (n, u),
        _ => {
            return Err(InsightError::Configuration(format!(
                "invalid time window spec '{}'",
                spec
            )))
        }
    };

    let number: i64 = number.parse().map_err(|_| {
        InsightError::Configuration(format!("invalid time window count in '{}'", spec))
    })?;
    if number <= 0 {
        return Err(InsightError::Configuration(format!(
            "time window '{}' must be positive",
            spec
        )));
    }

    let duration = match unit.to_lowercase().as_str() {
        "day" | "days" => chrono::Duration::days(number),
        "week" | "weeks" => chrono::Duration::weeks(number),
        "month" | "months" => chrono::Duration::days(number * 30),
        "year" | "years" => chrono::Duration::days(number * 365),
        other => {
            return Err(InsightError::Configuration(format!(
                "unsupported time unit '{}'",
                other
            )))
        }
    };

    Ok(duration)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        InsightError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        InsightError::Configuration(format!("cannot parse {}: {}", path.display(), e))
    })
}
