//! Node directory.
//!
//! Holds the set of reachable network nodes together with a small,
//! lock-free health record per node:
//! - success / failure counters
//! - an exponential "readmit" backoff after server errors
//!
//! The directory is read-mostly shared state. Many executions select nodes
//! from it concurrently; membership changes take a write lock, health
//! updates only touch atomics.

mod address;
mod directory;
mod entry;
mod health;

pub use address::NodeAddress;
pub use directory::{NoAvailableNode, NodeDirectory};
pub use entry::{Node, NodeHandle, NodeId};
pub use health::{NodeBackoff, NodeHealth};
