use std::time::Duration;

use anyhow::Result;

use crate::chunk::ChunkLimits;
use crate::config::ClientConfig;
use crate::retry::RetryPolicy;

/// Read-only settings of one executor, derived from [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub retry: RetryPolicy,
    pub chunking: ChunkLimits,
    /// Deadline across all attempts of one execution (None = budget only).
    pub request_timeout: Option<Duration>,
    /// Deadline for one network call (None = wait for the transport).
    pub attempt_timeout: Option<Duration>,
    /// Seed for per-execution random sources (None = OS entropy).
    pub seed: Option<u64>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunking: ChunkLimits::default(),
            request_timeout: Some(Duration::from_secs(120)),
            attempt_timeout: None,
            seed: None,
        }
    }
}

impl ExecutorSettings {
    pub fn from_config(cfg: &ClientConfig) -> Result<Self> {
        Ok(Self {
            retry: cfg.retry_policy()?,
            chunking: cfg.chunk_limits()?,
            request_timeout: Some(cfg.request_timeout()),
            attempt_timeout: cfg.attempt_timeout(),
            seed: cfg.seed,
        })
    }
}
