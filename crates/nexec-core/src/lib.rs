//! nexec core: execute requests against a network of service nodes with
//! classification-driven retries, node failover, payload chunking and
//! cancellable streaming subscriptions.

pub mod chunk;
pub mod client;
pub mod config;
pub mod engine;
pub mod logging;
pub mod node;
pub mod request;
pub mod retry;
pub mod sim;
pub mod subscription;
pub mod transport;

pub use client::Client;
