use serde::{Deserialize, Serialize};

use super::backoff::Backoff;
use super::budget::AttemptBudget;

/// What to do with the node after it answered "not complete yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryNodePolicy {
    /// Ask the same node again; the operation is still in flight there.
    #[default]
    SameNode,
    /// Exclude the node for the rest of the execution, like a server error.
    Rotate,
}

/// Retry settings shared by every execution of one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub node_policy: RetryNodePolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Backoff::default(),
            node_policy: RetryNodePolicy::SameNode,
        }
    }
}

impl RetryPolicy {
    /// A fresh budget for one execution.
    pub fn budget(&self) -> AttemptBudget {
        AttemptBudget::new(self.max_attempts)
    }
}
