//! LiveOps Insight: intent classification and context selection
//!
//! Maps a free-text analytic query to a typed intent, extracts entities,
//! and deterministically assembles a bounded, prioritized context bundle
//! for a downstream generation service.
//!
//! Pipeline: query text -> [`intent::EntityExtractor`] ->
//! [`intent::IntentClassifier`] -> [`context::RuleEngine`] ->
//! [`context::ContextSelector`] -> [`context::ContextBundle`].

pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod domain;
pub mod engine;
pub mod error;
pub mod generation;
pub mod intent;
pub mod metrics;
pub mod providers;
pub mod repo;

/// Commonly used types
pub mod prelude {
    pub use crate::catalog::{Catalogs, RuleKind};
    pub use crate::config::Config;
    pub use crate::context::{
        ContextBundle, ContextGap, ContextItem, ContextSelector, GapReason, RuleEngine,
        SelectionBudget,
    };
    pub use crate::engine::{InsightEngine, InsightResponse};
    pub use crate::error::{InsightError, Result};
    pub use crate::intent::{
        ClassifiedQuery, Entity, EntityExtractor, EntityMap, EntityType, IntentClassifier,
    };
    pub use crate::providers::{ChangeRepository, SimilarityProvider};
    pub use crate::repo::MemoryRepository;
}
