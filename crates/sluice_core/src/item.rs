//! Work items and cost estimation.

use serde::{Deserialize, Serialize};

/// Opaque unit of work: a rendered prompt plus its estimated token cost.
///
/// The core only reads the prompt and the cost; it never mutates an item.
///
/// # Example
///
/// ```
/// use sluice_core::{CostEstimator, WorkItem};
///
/// let item = WorkItem::new("ML123/FAIR", "Check this listing for violations");
/// let estimator = CostEstimator::default();
/// assert_eq!(estimator.cost_for(&item), Some(8 + 6590));
///
/// let priced = WorkItem::new("ML124/FAIR", "...").with_cost(1_000);
/// assert_eq!(estimator.cost_for(&priced), Some(1_000));
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct WorkItem {
    /// Caller-chosen identifier, used only in logs
    key: String,
    /// Rendered prompt sent to the remote service
    prompt: String,
    /// Explicit cost in tokens; estimated from the prompt when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    estimated_cost: Option<u64>,
}

impl WorkItem {
    /// Create a work item whose cost will be estimated from its prompt.
    pub fn new(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            estimated_cost: None,
        }
    }

    /// Attach an explicit token cost.
    pub fn with_cost(mut self, tokens: u64) -> Self {
        self.estimated_cost = Some(tokens);
        self
    }
}

/// Conservative token-cost estimator.
///
/// Input cost is `characters / chars_per_token`; output cost is a fixed
/// ceiling because the real output length is unknown until the call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimator {
    chars_per_token: usize,
    output_token_ceiling: u64,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            output_token_ceiling: 6590,
        }
    }
}

impl CostEstimator {
    /// Create an estimator with the given ratio and output ceiling.
    pub fn new(chars_per_token: usize, output_token_ceiling: u64) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            output_token_ceiling,
        }
    }

    /// Estimate the total (input + output) tokens for `text`.
    pub fn estimate(&self, text: &str) -> u64 {
        let input = text.chars().count() / self.chars_per_token.max(1);
        input as u64 + self.output_token_ceiling
    }

    /// Cost of an item, or `None` if the item cannot be costed.
    ///
    /// An item with a blank prompt or an explicit zero cost is uncostable.
    pub fn cost_for(&self, item: &WorkItem) -> Option<u64> {
        if item.prompt.trim().is_empty() {
            return None;
        }
        match item.estimated_cost {
            Some(0) => None,
            Some(cost) => Some(cost),
            None => Some(self.estimate(&item.prompt)),
        }
    }
}
