//! Query understanding: entity extraction and intent classification

pub mod classifier;
pub mod extractor;
pub mod models;

pub use classifier::{IntentClassifier, FALLBACK_INTENT};
pub use extractor::EntityExtractor;
pub use models::{ClassifiedQuery, Entity, EntityMap, EntityType};
