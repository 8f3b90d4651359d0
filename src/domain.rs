//! Built-in domain glossary
//!
//! Curated notes about live-ops concepts, change categories, and metrics.
//! Surfaced through the `domain_knowledge` rule kind and used as the corpus
//! for `similar_patterns` lookups.

use crate::intent::models::{EntityMap, EntityType};
use serde::{Deserialize, Serialize};

/// One glossary entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryNote {
    pub term: String,
    pub note: String,
}

/// Static domain glossary
pub struct DomainKnowledge {
    concepts: Vec<GlossaryNote>,
    category_notes: Vec<GlossaryNote>,
    metric_notes: Vec<GlossaryNote>,
}

impl DomainKnowledge {
    pub fn new() -> Self {
        Self {
            concepts: notes(&[
                ("BOGO", "Buy One Get One Free offers drive conversion and immediate revenue but can depress long-term ARPPU and inflate bankrolls."),
                ("RTP", "Return To Player adjustments move win rates and session length; higher RTP helps retention at the cost of revenue per session."),
                ("Cooldown", "Cooldown length changes engagement frequency; shorter cooldowns lift DAU but can erode long-term retention."),
                ("Featured Placement", "Featured positions raise visibility and short-term engagement for the promoted content."),
                ("Limited Time Event", "Urgency mechanics produce strong short-term engagement and revenue spikes."),
                ("OOC", "Out of Coins: a depleted bankroll pushes purchases but risks churn if players hit it too often."),
                ("SLIB", "Spins Left in Bankroll: players near the end of their bankroll are the likeliest to purchase."),
                ("Risk of Ruin", "Players with bankrolls that never shrink lose interest; some loss keeps the gamble compelling."),
            ]),
            category_notes: notes(&[
                ("Add Slot", "New machines drive short-term engagement; revenue follows when theme and mechanics land."),
                ("Remove Slot", "Retiring weak content redirects players toward better performing games."),
                ("RTP Adjustments", "RTP is the share of wagers returned to players; player-friendly but margin-reducing when raised."),
                ("BOGO", "Strong conversion driver; can cheapen the perceived value of regular-priced items."),
                ("Pearly Rush Event", "Collection event that leans on completionist mechanics for engagement."),
                ("Dealers Edge Event", "Table-game event appealing to the skill-game player segment."),
            ]),
            metric_notes: notes(&[
                ("revenue", "Direct monetization through in-app purchases; the primary business metric."),
                ("dau", "Daily Active Users; overall engagement and reach."),
                ("retention", "Share of users returning after their first session; the long-term health metric."),
                ("session_length", "Time in app per session; a depth-of-engagement signal."),
                ("conversion_rate", "Share of users who purchase; monetization efficiency."),
                ("slib", "Spins Left in Bankroll; low values predict purchases."),
                ("ooc", "Out of Coins events; revenue driver with churn risk attached."),
            ]),
        }
    }

    /// Glossary notes relevant to a query: concept terms mentioned in the
    /// text plus notes for any extracted category or metric entities.
    pub fn notes_for_query(&self, query_text: &str, entities: &EntityMap) -> Vec<GlossaryNote> {
        let lowered = query_text.to_lowercase();
        let mut out: Vec<GlossaryNote> = Vec::new();

        for concept in &self.concepts {
            if lowered.contains(&concept.term.to_lowercase()) {
                out.push(concept.clone());
            }
        }

        if let Some(entity) = entities.get(&EntityType::Category) {
            for value in &entity.values {
                if let Some(note) = self
                    .category_notes
                    .iter()
                    .find(|n| n.term.eq_ignore_ascii_case(value))
                {
                    push_unique(&mut out, note);
                }
            }
        }

        if let Some(entity) = entities.get(&EntityType::Metric) {
            for value in &entity.values {
                if let Some(note) = self
                    .metric_notes
                    .iter()
                    .find(|n| n.term.eq_ignore_ascii_case(value))
                {
                    push_unique(&mut out, note);
                }
            }
        }

        out
    }

    /// The full glossary as a similarity corpus for pattern lookups
    pub fn all_notes(&self) -> Vec<GlossaryNote> {
        self.concepts
            .iter()
            .chain(self.category_notes.iter())
            .chain(self.metric_notes.iter())
            .cloned()
            .collect()
    }
}

impl Default for DomainKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

fn notes(pairs: &[(&str, &str)]) -> Vec<GlossaryNote> {
    pairs
        .iter()
        .map(|(term, note)| GlossaryNote {
            term: term.to_string(),
            note: note.to_string(),
        })
        .collect()
}

fn push_unique(out: &mut Vec<GlossaryNote>, note: &GlossaryNote) {
    if !out.iter().any(|n| n.term == note.term) {
        out.push(note.clone());
    }
}
