//! Shared fixtures for the integration tests: a small node network and
//! executors over the scripted transport.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use nexec_core::chunk::ChunkLimits;
use nexec_core::engine::{Executor, ExecutorSettings};
use nexec_core::node::{NodeAddress, NodeBackoff, NodeDirectory, NodeId};
use nexec_core::request::{LogicalRequestId, Request};
use nexec_core::retry::{Backoff, RetryNodePolicy, RetryPolicy};
use nexec_core::sim::ScriptedTransport;

pub const NODES: [&str; 3] = ["0.0.3", "0.0.4", "0.0.5"];

/// Directory holding `ids`, addressed 127.0.0.1:50211, :50212, ...
pub fn directory(ids: &[&str]) -> Arc<NodeDirectory> {
    let dir = NodeDirectory::new(NodeBackoff::default());
    for (i, id) in ids.iter().enumerate() {
        let address = NodeAddress::parse(&format!("127.0.0.1:{}", 50211 + i)).unwrap();
        assert!(dir.add_node(NodeId::from(*id), address));
    }
    Arc::new(dir)
}

/// Seeded settings with the default 250ms -> 8s backoff and no timeouts.
pub fn settings(max_attempts: u32) -> ExecutorSettings {
    ExecutorSettings {
        retry: RetryPolicy {
            max_attempts,
            backoff: Backoff::new(Duration::from_millis(250), Duration::from_secs(8)),
            node_policy: RetryNodePolicy::SameNode,
        },
        chunking: ChunkLimits::default(),
        request_timeout: None,
        attempt_timeout: None,
        seed: Some(7),
    }
}

pub fn executor(
    transport: &Arc<ScriptedTransport>,
    ids: &[&str],
    settings: ExecutorSettings,
) -> Executor<ScriptedTransport> {
    Executor::new(Arc::clone(transport), directory(ids), settings)
}

pub fn request(payload: &'static str) -> Request {
    Request::new(LogicalRequestId::from_bytes([0xab; 16]), payload)
}
