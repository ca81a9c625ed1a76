//! Failure detail recorded for unsuccessful attempts.

use crate::node::NodeId;
use crate::transport::{Status, TransportError};

/// Why an attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("node replied {0}")]
    Status(Status),
}

/// One failed attempt: where it ran and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attempt #{attempt} on node {node}: {kind}")]
pub struct Failure {
    pub node: NodeId,
    pub attempt: u32,
    pub kind: FailureKind,
}
