//! Node identity and per-node record.

use std::fmt;
use std::sync::Arc;

use super::address::NodeAddress;
use super::health::{NodeBackoff, NodeHealth};

/// Stable identifier of a node (e.g. `0.0.3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One endpoint of the service network.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    address: NodeAddress,
    health: NodeHealth,
}

/// Shared reference handed out by the directory. The engine uses it only as
/// a selection token and a transport target.
pub type NodeHandle = Arc<Node>;

impl Node {
    pub fn new(id: NodeId, address: NodeAddress, backoff: NodeBackoff) -> Self {
        Self {
            id,
            address,
            health: NodeHealth::new(backoff),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn health(&self) -> &NodeHealth {
        &self.health
    }
}
