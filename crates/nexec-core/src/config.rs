use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::ChunkLimits;
use crate::node::NodeBackoff;
use crate::retry::{Backoff, RetryNodePolicy, RetryPolicy};

/// Retry policy parameters (optional `[retry]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: f64,
    /// What to do with a node that answered "pending": "same-node" or "rotate".
    #[serde(default)]
    pub node_policy: RetryNodePolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_secs: 0.25,
            max_delay_secs: 8.0,
            node_policy: RetryNodePolicy::SameNode,
        }
    }
}

/// Chunking limits (optional `[chunking]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Largest payload sent in one message, in bytes.
    pub max_chunk_size: usize,
    /// Most chunks one logical request may be split into.
    pub max_chunk_count: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1024,
            max_chunk_count: 20,
        }
    }
}

/// Per-node readmit backoff (optional `[node_health]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHealthConfig {
    pub min_backoff_secs: f64,
    pub max_backoff_secs: f64,
}

impl Default for NodeHealthConfig {
    fn default() -> Self {
        Self {
            min_backoff_secs: 8.0,
            max_backoff_secs: 3600.0,
        }
    }
}

/// One entry of the initial node population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Stable node identifier, e.g. "0.0.3".
    pub id: String,
    /// `host:port` or a URL.
    pub address: String,
}

/// Client configuration loaded from `~/.config/nexec/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Overall deadline for one execution, across all attempts.
    pub request_timeout_secs: u64,
    /// Optional deadline for a single network call (None = wait for the transport).
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
    /// Optional seed for node selection and request ids (None = OS entropy).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional chunking limits; if missing, built-in defaults are used.
    #[serde(default)]
    pub chunking: Option<ChunkConfig>,
    /// Optional node health backoff; if missing, built-in defaults are used.
    #[serde(default)]
    pub node_health: Option<NodeHealthConfig>,
    /// Initial node directory.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            attempt_timeout_ms: None,
            seed: None,
            retry: None,
            chunking: None,
            node_health: None,
            nodes: vec![
                NodeConfig {
                    id: "0.0.3".to_string(),
                    address: "127.0.0.1:50211".to_string(),
                },
                NodeConfig {
                    id: "0.0.4".to_string(),
                    address: "127.0.0.1:50212".to_string(),
                },
                NodeConfig {
                    id: "0.0.5".to_string(),
                    address: "127.0.0.1:50213".to_string(),
                },
            ],
        }
    }
}

fn secs(value: f64, what: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| anyhow::anyhow!("{what} must be a finite, non-negative number of seconds"))
}

impl ClientConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        let retry = self.retry.clone().unwrap_or_default();
        let base = secs(retry.base_delay_secs, "retry.base_delay_secs")?;
        let max = secs(retry.max_delay_secs, "retry.max_delay_secs")?;
        if base > max {
            anyhow::bail!("retry.base_delay_secs must not exceed retry.max_delay_secs");
        }
        if retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be greater than zero");
        }
        Ok(RetryPolicy {
            max_attempts: retry.max_attempts,
            backoff: Backoff::new(base, max),
            node_policy: retry.node_policy,
        })
    }

    pub fn chunk_limits(&self) -> Result<ChunkLimits> {
        let chunking = self.chunking.clone().unwrap_or_default();
        if chunking.max_chunk_size == 0 {
            anyhow::bail!("chunking.max_chunk_size must be greater than zero");
        }
        if chunking.max_chunk_count == 0 {
            anyhow::bail!("chunking.max_chunk_count must be greater than zero");
        }
        Ok(ChunkLimits {
            max_chunk_size: chunking.max_chunk_size,
            max_chunk_count: chunking.max_chunk_count,
        })
    }

    pub fn node_backoff(&self) -> Result<NodeBackoff> {
        let health = self.node_health.clone().unwrap_or_default();
        let min = secs(health.min_backoff_secs, "node_health.min_backoff_secs")?;
        let max = secs(health.max_backoff_secs, "node_health.max_backoff_secs")?;
        if min > max {
            anyhow::bail!("node_health.min_backoff_secs must not exceed node_health.max_backoff_secs");
        }
        Ok(NodeBackoff { min, max })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }

    /// Check every section; called by the loaders so a bad file fails early.
    pub fn validate(&self) -> Result<()> {
        self.retry_policy()?;
        self.chunk_limits()?;
        self.node_backoff()?;
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                anyhow::bail!("duplicate node id in config: {}", node.id);
            }
            crate::node::NodeAddress::parse(&node.address)
                .with_context(|| format!("node {}", node.id))?;
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nexec")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: ClientConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClientConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}
