//! Entity extraction from query text
//!
//! Pattern/alias-based recognition driven entirely by the entity-type
//! catalog. For each configured type the alias table is applied first
//! (case-insensitive phrase match on word boundaries), then the regex
//! pattern set; hits are merged in first-seen order and duplicates
//! collapsed. Types with a closed enumeration (category, metric) normalize
//! to the canonical value; open types keep the trimmed surface span.
//!
//! Extraction is a pure function of the query text and the static catalog:
//! no provider calls, no clock, no shared state.

use crate::catalog::{EntityCatalog, EntityTypeDef};
use crate::error::{InsightError, Result};
use crate::intent::models::{Entity, EntityMap, EntityType};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::debug;

/// Compiled recognizer for one entity type
struct CompiledType {
    entity_type: EntityType,
    /// Literal value/alias matchers paired with the canonical value they yield
    canonical: Vec<(Regex, String)>,
    /// Free patterns; the trimmed surface span is kept as the value
    patterns: Vec<Regex>,
    /// Lowercased trigger phrases; empty means "always active"
    cues: Vec<String>,
}

/// The entity extractor
pub struct EntityExtractor {
    compiled: Vec<CompiledType>,
}

impl EntityExtractor {
    /// Compile the entity-type catalog into matchers
    pub fn new(catalog: &EntityCatalog) -> Result<Self> {
        let mut compiled = Vec::with_capacity(catalog.entity_types.len());

        for (entity_type, def) in &catalog.entity_types {
            compiled.push(Self::compile_type(*entity_type, def)?);
        }

        Ok(Self { compiled })
    }

    fn compile_type(entity_type: EntityType, def: &EntityTypeDef) -> Result<CompiledType> {
        let mut canonical = Vec::new();

        for value in &def.values {
            canonical.push((literal_matcher(value)?, value.clone()));
        }
        for (alias, value) in &def.aliases {
            canonical.push((literal_matcher(alias)?, value.clone()));
        }

        let mut patterns = Vec::new();
        for pattern in &def.patterns {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    InsightError::Configuration(format!(
                        "invalid pattern for entity type '{}': {}",
                        entity_type, e
                    ))
                })?;
            patterns.push(re);
        }

        Ok(CompiledType {
            entity_type,
            canonical,
            patterns,
            cues: def.cues.iter().map(|c| c.to_lowercase()).collect(),
        })
    }

    /// Extract entities from query text
    pub fn extract(&self, text: &str) -> EntityMap {
        self.extract_with_seed(text, &EntityMap::new())
    }

    /// Extract entities, augmenting a pre-populated map from a prior turn
    ///
    /// Seed values always come first; freshly extracted values are appended
    /// in first-seen order and never overwrite what the caller supplied.
    pub fn extract_with_seed(&self, text: &str, seed: &EntityMap) -> EntityMap {
        let mut result = seed.clone();
        let lowered = text.to_lowercase();

        for compiled in &self.compiled {
            if !compiled.cues.is_empty() && !compiled.cues.iter().any(|c| lowered.contains(c)) {
                continue;
            }

            let values = Self::match_type(compiled, text);
            if values.is_empty() {
                continue;
            }

            match result.get_mut(&compiled.entity_type) {
                Some(existing) => {
                    let mut seen: HashSet<String> =
                        existing.values.iter().map(|v| v.to_lowercase()).collect();
                    for value in values {
                        if seen.insert(value.to_lowercase()) {
                            existing.values.push(value);
                        }
                    }
                }
                None => {
                    result.insert(
                        compiled.entity_type,
                        Entity::new(compiled.entity_type, values),
                    );
                }
            }
        }

        debug!(entity_count = result.len(), "Entities extracted");
        result
    }

    /// Run one type's matchers and return deduplicated values in text order
    fn match_type(compiled: &CompiledType, text: &str) -> Vec<String> {
        // (position in text, value) so merged alias and pattern hits keep
        // first-seen order.
        let mut hits: Vec<(usize, String)> = Vec::new();

        for (re, value) in &compiled.canonical {
            for m in re.find_iter(text) {
                hits.push((m.start(), value.clone()));
            }
        }
        for re in &compiled.patterns {
            for m in re.find_iter(text) {
                let surface = m.as_str().trim();
                if !surface.is_empty() {
                    hits.push((m.start(), surface.to_string()));
                }
            }
        }

        hits.sort_by_key(|(pos, _)| *pos);

        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for (_, value) in hits {
            if seen.insert(value.to_lowercase()) {
                values.push(value);
            }
        }
        values
    }
}

/// Build a case-insensitive, word-boundary matcher for a literal phrase
fn literal_matcher(phrase: &str) -> Result<Regex> {
    let escaped = regex::escape(phrase.trim());
    RegexBuilder::new(&format!(r"\b{}\b", escaped))
        .case_insensitive(true)
        .build()
        .map_err(|e| InsightError::Configuration(format!("invalid alias '{}': {}", phrase, e)))
}
