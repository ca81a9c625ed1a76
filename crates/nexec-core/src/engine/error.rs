//! Terminal outcomes of an execution other than success.

use crate::node::NoAvailableNode;
use crate::retry::Failure;

/// Why an execution ended without a success payload.
///
/// `Cancelled` is caller-initiated rather than a fault, but it is still a
/// distinct terminal outcome and is reported here so every path is explicit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecuteError {
    /// The node rejected the request itself; never retried.
    #[error("request rejected: {0}")]
    Request(Failure),
    /// Every attempt in the budget was used.
    #[error("max attempts ({attempts}) exceeded")]
    MaxAttemptsExceeded {
        attempts: u32,
        #[source]
        last: Option<Failure>,
    },
    /// The overall request deadline passed between attempts.
    #[error("request timed out after {attempts} attempt(s)")]
    Timeout {
        attempts: u32,
        #[source]
        last: Option<Failure>,
    },
    #[error(transparent)]
    NoAvailableNode(#[from] NoAvailableNode),
    #[error("execution cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl ExecuteError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecuteError::Cancelled { .. })
    }

    /// Last failure observed before the execution ended, if any.
    pub fn last_failure(&self) -> Option<&Failure> {
        match self {
            ExecuteError::Request(f) => Some(f),
            ExecuteError::MaxAttemptsExceeded { last, .. } | ExecuteError::Timeout { last, .. } => {
                last.as_ref()
            }
            ExecuteError::NoAvailableNode(_) | ExecuteError::Cancelled { .. } => None,
        }
    }
}
