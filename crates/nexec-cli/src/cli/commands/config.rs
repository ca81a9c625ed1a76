//! `nexec config` – show where the config lives and what is in effect.

use std::path::Path;

use anyhow::Result;
use nexec_core::config::{self, ClientConfig};
use nexec_core::logging;

pub fn run_config(explicit: Option<&Path>, cfg: &ClientConfig) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# config: {}", path.display());
    if let Ok(log) = logging::log_file_path() {
        println!("# log:    {}", log.display());
    }
    print!("{}", toml::to_string_pretty(cfg)?);
    let retry = cfg.retry_policy()?;
    let chunking = cfg.chunk_limits()?;
    println!();
    println!(
        "# effective: {} attempts, backoff {:?} -> {:?}, retry node policy {:?}",
        retry.max_attempts, retry.backoff.base_delay, retry.backoff.max_delay, retry.node_policy
    );
    println!(
        "# effective: chunks of {} bytes, at most {} per request",
        chunking.max_chunk_size, chunking.max_chunk_count
    );
    Ok(())
}
