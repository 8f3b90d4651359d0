//! Generation boundary
//!
//! The engine hands a rendered prompt to an opaque text-generation service.
//! Everything past the trait is a collaborator: the HTTP client here is one
//! implementation, and queries still work with no client configured (the
//! engine falls back to a data-only summary).

pub mod client;
pub mod prompt;

use crate::error::Result;
use async_trait::async_trait;

pub use client::HttpGenerationClient;
pub use prompt::render_query_prompt;

/// Opaque text-generation service
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Generate an answer from a fully rendered prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}
