//! Context rule engine
//!
//! Resolves the raw selection-rules catalog into per-intent ordered rule
//! lists with parsed time windows and defaulted caps/thresholds. Built once
//! at startup and read-only afterwards; every validation failure here is a
//! fatal configuration error.

use crate::catalog::{parse_time_window, Catalogs, RuleKind};
use crate::context::budget::SelectionBudget;
use crate::error::Result;
use crate::intent::FALLBACK_INTENT;
use chrono::Duration;
use indexmap::IndexMap;
use std::time::Duration as StdDuration;

/// Items a rule may contribute when it does not declare its own cap
const DEFAULT_MAX_ITEMS: usize = 10;

/// One resolved context rule
#[derive(Debug, Clone)]
pub struct ContextRule {
    pub kind: RuleKind,
    pub description: String,
    /// Position in the intent's priority order; lower resolves first
    pub priority: usize,
    pub time_window: Option<Duration>,
    pub window_before: Option<Duration>,
    pub window_after: Option<Duration>,
    pub max_items: usize,
    pub similarity_threshold: f32,
    pub required: bool,
}

/// The rule engine: per-intent rule lists plus selection-wide defaults
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: IndexMap<String, Vec<ContextRule>>,
    budget: SelectionBudget,
    default_window: Duration,
    provider_timeout: StdDuration,
}

impl RuleEngine {
    /// Build from validated catalogs
    pub fn from_catalogs(catalogs: &Catalogs) -> Result<Self> {
        let defaults = &catalogs.rules.default_settings;
        let budget = SelectionBudget::from_limits(&defaults.token_limits)?;
        let default_window = parse_time_window(&defaults.time.default_window)?;
        let default_threshold = defaults.similarity.default_threshold;

        let mut rules = IndexMap::new();
        for (intent_id, rule_set) in &catalogs.rules.context_rules {
            let mut resolved = Vec::with_capacity(rule_set.rules.len());

            // priority_order drives resolution order, not the declaration
            // order of the rules array.
            for (priority, kind) in rule_set.priority_order.iter().enumerate() {
                let spec = rule_set
                    .rules
                    .iter()
                    .find(|r| r.kind == *kind)
                    .expect("validated: priority_order entries have a rule");

                resolved.push(ContextRule {
                    kind: spec.kind,
                    description: spec.description.clone(),
                    priority,
                    time_window: parse_optional(&spec.time_window)?,
                    window_before: parse_optional(&spec.time_window_before)?,
                    window_after: parse_optional(&spec.time_window_after)?,
                    max_items: spec.max_items.unwrap_or(DEFAULT_MAX_ITEMS),
                    similarity_threshold: spec.similarity_threshold.unwrap_or(default_threshold),
                    required: spec.required,
                });
            }

            rules.insert(intent_id.clone(), resolved);
        }

        Ok(Self {
            rules,
            budget,
            default_window,
            provider_timeout: StdDuration::from_millis(defaults.provider_timeout_ms),
        })
    }

    /// The ordered rule list for an intent
    ///
    /// Unknown intents resolve to the `general_query` rules so a query can
    /// always assemble some context.
    pub fn rules_for(&self, intent_id: &str) -> &[ContextRule] {
        self.rules
            .get(intent_id)
            .or_else(|| self.rules.get(FALLBACK_INTENT))
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    pub fn budget(&self) -> SelectionBudget {
        self.budget
    }

    pub fn default_window(&self) -> Duration {
        self.default_window
    }

    pub fn provider_timeout(&self) -> StdDuration {
        self.provider_timeout
    }
}

fn parse_optional(spec: &Option<String>) -> Result<Option<Duration>> {
    spec.as_deref().map(parse_time_window).transpose()
}
