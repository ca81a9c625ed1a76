//! CLI for the nexec network executor.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nexec_core::config::{self, ClientConfig};

use commands::{run_config, run_nodes, run_simulate, run_subscribe, SimulateOptions, SubscribeOptions};

/// Top-level CLI for nexec.
#[derive(Debug, Parser)]
#[command(name = "nexec")]
#[command(about = "nexec: retrying, failing-over request execution against a node network", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/nexec/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the config file location and the effective configuration.
    Config,

    /// List the configured nodes.
    Nodes,

    /// Submit a payload through the engine against a simulated flaky network.
    Simulate {
        /// Payload size in bytes; larger than one chunk means a chunked submission.
        #[arg(long, default_value = "4096", value_name = "BYTES")]
        payload_size: usize,
        /// Share of sends that hit a node fault (0.0-1.0).
        #[arg(long, default_value = "0.2", value_name = "F")]
        fail_rate: f64,
        /// Share of sends answered "pending" (0.0-1.0).
        #[arg(long, default_value = "0.1", value_name = "F")]
        pending_rate: f64,
        /// Share of sends rejected as invalid (0.0-1.0).
        #[arg(long, default_value = "0.0", value_name = "F")]
        reject_rate: f64,
        /// Seed for the simulated network and node selection.
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Stream simulated items and unsubscribe after a number of deliveries.
    Subscribe {
        /// Items the simulated stream produces.
        #[arg(long, default_value = "10", value_name = "N")]
        items: usize,
        /// Unsubscribe after this many deliveries (default: read to the end).
        #[arg(long, value_name = "K")]
        stop_after: Option<usize>,
        /// Delay between stream items, in milliseconds.
        #[arg(long, default_value = "100", value_name = "MS")]
        interval_ms: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    match path {
        Some(path) => config::load_from_path(path),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_ref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Config => run_config(cli.config.as_deref(), &cfg)?,
            CliCommand::Nodes => run_nodes(&cfg)?,
            CliCommand::Simulate {
                payload_size,
                fail_rate,
                pending_rate,
                reject_rate,
                seed,
                json,
            } => {
                let opts = SimulateOptions {
                    payload_size,
                    fail_rate,
                    pending_rate,
                    reject_rate,
                    seed,
                };
                run_simulate(&cfg, &opts, json).await?;
            }
            CliCommand::Subscribe {
                items,
                stop_after,
                interval_ms,
            } => {
                let opts = SubscribeOptions {
                    items,
                    stop_after,
                    interval: std::time::Duration::from_millis(interval_ms),
                };
                run_subscribe(&cfg, &opts).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
