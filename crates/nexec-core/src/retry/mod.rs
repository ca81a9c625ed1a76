//! Retry and backoff policy.
//!
//! This module holds the pieces the execution engine consults on every
//! attempt: the attempt budget, the backoff curve, and the classifier that
//! turns a raw outcome into an [`ExecutionState`].

mod backoff;
mod budget;
mod classify;
mod failure;
mod policy;

pub use backoff::Backoff;
pub use budget::AttemptBudget;
pub use classify::{classify, classify_status, ExecutionState, Response};
pub use failure::{Failure, FailureKind};
pub use policy::{RetryNodePolicy, RetryPolicy};
