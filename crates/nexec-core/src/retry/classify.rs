//! Classify raw outcomes into execution states.

use std::fmt;

use bytes::Bytes;

use crate::transport::{RawOutcome, Status};

use super::failure::FailureKind;

/// What the engine does after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Done; return the payload.
    Success,
    /// Accepted but not finished; wait and ask again.
    Retry,
    /// Node-level fault; try a different node.
    ServerError,
    /// The request itself is bad; never retried.
    RequestError,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Success | ExecutionState::RequestError)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Success => "success",
            ExecutionState::Retry => "retry",
            ExecutionState::ServerError => "server-error",
            ExecutionState::RequestError => "request-error",
        };
        f.write_str(s)
    }
}

/// Classified outcome of one attempt, tagged by its [`ExecutionState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Bytes),
    Retry(Status),
    ServerError(FailureKind),
    RequestError(Status),
}

impl Response {
    pub fn state(&self) -> ExecutionState {
        match self {
            Response::Success(_) => ExecutionState::Success,
            Response::Retry(_) => ExecutionState::Retry,
            Response::ServerError(_) => ExecutionState::ServerError,
            Response::RequestError(_) => ExecutionState::RequestError,
        }
    }

    /// Failure detail for every state except success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Response::Success(_) => None,
            Response::Retry(status) | Response::RequestError(status) => {
                Some(FailureKind::Status(status.clone()))
            }
            Response::ServerError(kind) => Some(kind.clone()),
        }
    }
}

/// Map an application status to the state it drives.
pub fn classify_status(status: &Status) -> ExecutionState {
    match status {
        Status::Busy(_) => ExecutionState::ServerError,
        Status::Pending => ExecutionState::Retry,
        Status::Invalid(_) | Status::Unauthorized(_) => ExecutionState::RequestError,
        Status::Ok => ExecutionState::Success,
    }
}

/// Classify one raw outcome. Total, and independent of the attempt number.
pub fn classify(outcome: &RawOutcome) -> Response {
    match outcome {
        RawOutcome::Transport(e) => Response::ServerError(FailureKind::Transport(e.clone())),
        RawOutcome::Reply { status, payload } => match classify_status(status) {
            ExecutionState::Success => Response::Success(payload.clone()),
            ExecutionState::Retry => Response::Retry(status.clone()),
            ExecutionState::ServerError => {
                Response::ServerError(FailureKind::Status(status.clone()))
            }
            ExecutionState::RequestError => Response::RequestError(status.clone()),
        },
    }
}
