//! Token estimation for context payloads

use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for a JSON payload via its serialized form
    fn estimate_json(&self, value: &serde_json::Value) -> usize {
        match serde_json::to_string(value) {
            Ok(s) => self.estimate(&s),
            Err(_) => 0,
        }
    }
}

/// Character-ratio estimator (~4 characters per token)
///
/// Deterministic and dependency-free; the default for budget enforcement,
/// where reproducibility matters more than per-model accuracy.
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.len() / self.chars_per_token).max(1)
    }
}

/// Tiktoken-based estimator using cl100k_base
///
/// More accurate for OpenAI-family models; slower to construct. Still
/// deterministic for a fixed encoding, so it is budget-safe.
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bpe = cl100k_base()?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
