//! Token budget enforcement for context selection

use crate::catalog::TokenLimits;
use crate::error::{InsightError, Result};
use serde::{Deserialize, Serialize};

/// The selection budget: a global cap minus a reserve for the model's
/// answer, plus a per-item ceiling
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionBudget {
    pub max_total_tokens: usize,
    pub reserved_tokens: usize,
    pub per_item_limit: usize,
}

impl SelectionBudget {
    pub fn from_limits(limits: &TokenLimits) -> Result<Self> {
        let budget = Self {
            max_total_tokens: limits.max_total_tokens,
            reserved_tokens: limits.reserved_tokens,
            per_item_limit: limits.per_item_limit,
        };
        budget.validate()?;
        Ok(budget)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reserved_tokens >= self.max_total_tokens {
            return Err(InsightError::Configuration(format!(
                "reserved_tokens ({}) must be below max_total_tokens ({})",
                self.reserved_tokens, self.max_total_tokens
            )));
        }
        if self.per_item_limit == 0 {
            return Err(InsightError::Configuration(
                "per_item_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Tokens available for context items
    pub fn available(&self) -> usize {
        self.max_total_tokens - self.reserved_tokens
    }
}

/// Outcome of offering one item to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    /// The single item exceeds the per-item ceiling; skip it and keep going
    ItemTooLarge,
    /// The cumulative cap is hit; no further items will be accepted
    Exhausted,
}

/// Running budget state for one selection pass
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budget: SelectionBudget,
    used: usize,
    saturated: bool,
}

impl BudgetTracker {
    pub fn new(budget: SelectionBudget) -> Self {
        Self {
            budget,
            used: 0,
            saturated: false,
        }
    }

    /// Offer an item of the given token size
    pub fn offer(&mut self, tokens: usize) -> AcceptOutcome {
        if self.saturated {
            return AcceptOutcome::Exhausted;
        }
        if tokens > self.budget.per_item_limit {
            return AcceptOutcome::ItemTooLarge;
        }
        if self.used + tokens > self.budget.available() {
            self.saturated = true;
            return AcceptOutcome::Exhausted;
        }
        self.used += tokens;
        AcceptOutcome::Accepted
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn budget(&self) -> &SelectionBudget {
        &self.budget
    }
}
