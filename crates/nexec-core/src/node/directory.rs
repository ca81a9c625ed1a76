//! Shared node set and node selection.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ClientConfig;

use super::address::NodeAddress;
use super::entry::{Node, NodeHandle, NodeId};
use super::health::NodeBackoff;

/// Every known node was excluded (or none is known).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no available node ({known} known, {excluded} excluded)")]
pub struct NoAvailableNode {
    pub known: usize,
    pub excluded: usize,
}

/// Current set of reachable nodes.
///
/// Selection takes a read lock only; health updates go through the nodes'
/// atomics, so concurrent executions never serialize on the directory.
#[derive(Debug)]
pub struct NodeDirectory {
    nodes: RwLock<Vec<NodeHandle>>,
    backoff: NodeBackoff,
}

impl NodeDirectory {
    /// Empty directory; nodes added later get `backoff` as health bounds.
    pub fn new(backoff: NodeBackoff) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            backoff,
        }
    }

    /// Build the initial population from the client configuration.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self> {
        let dir = Self::new(cfg.node_backoff()?);
        for node in &cfg.nodes {
            let address = NodeAddress::parse(&node.address)?;
            if !dir.add_node(NodeId::from(node.id.as_str()), address) {
                anyhow::bail!("duplicate node id in config: {}", node.id);
            }
        }
        Ok(dir)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<NodeHandle>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a node. Returns false if a node with the same id is already known.
    pub fn add_node(&self, id: NodeId, address: NodeAddress) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.iter().any(|n| n.id() == &id) {
            return false;
        }
        tracing::debug!(node = %id, address = %address, "node added to directory");
        nodes.push(Arc::new(Node::new(id, address, self.backoff)));
        true
    }

    /// Remove a node. In-flight executions holding its handle keep using it.
    pub fn remove_node(&self, id: &NodeId) -> bool {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let before = nodes.len();
        nodes.retain(|n| n.id() != id);
        before != nodes.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.read().iter().any(|n| n.id() == id)
    }

    pub fn get(&self, id: &NodeId) -> Option<NodeHandle> {
        self.read().iter().find(|n| n.id() == id).cloned()
    }

    /// Snapshot of all nodes, in insertion order.
    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.read().clone()
    }

    /// Pick a node that is not in `excluding`.
    ///
    /// Healthy candidates are chosen uniformly at random from `rng`; if every
    /// candidate is backed off, the one with the smallest remaining backoff
    /// is returned.
    pub fn pick_node<R: Rng + ?Sized>(
        &self,
        excluding: &HashSet<NodeId>,
        rng: &mut R,
    ) -> Result<NodeHandle, NoAvailableNode> {
        let nodes = self.read();
        let candidates: Vec<&NodeHandle> = nodes
            .iter()
            .filter(|n| !excluding.contains(n.id()))
            .collect();
        let healthy: Vec<&NodeHandle> = candidates
            .iter()
            .copied()
            .filter(|n| n.health().is_healthy())
            .collect();

        healthy
            .choose(rng)
            .copied()
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .min_by_key(|n| n.health().remaining_backoff())
            })
            .cloned()
            .ok_or(NoAvailableNode {
                known: nodes.len(),
                excluded: excluding.len(),
            })
    }
}
