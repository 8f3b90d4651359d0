//! Change/metric repository: models, in-memory store, sample data

pub mod memory;
pub mod models;
pub mod sample;

pub use memory::MemoryRepository;
pub use models::{ChangeRecord, ImpactDirection, MetricMeasurement, TimeRange};
pub use sample::seed_repository;
