//! Execution engine.
//!
//! Runs one request against the network: pick a node, send, classify,
//! then retry, fail over or stop. Each execution owns its attempt budget,
//! its exclusion set and its random source; the node directory is the only
//! state shared between concurrent executions.

mod cancel;
mod error;
mod execute;
mod settings;

pub use cancel::CancelToken;
pub use error::ExecuteError;
pub use execute::{Completion, Executor};
pub use settings::ExecutorSettings;
