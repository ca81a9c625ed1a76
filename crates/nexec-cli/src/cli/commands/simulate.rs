//! `nexec simulate` – submit a payload through the engine against an
//! in-process flaky network and report what each chunk went through.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use bytes::Bytes;
use nexec_core::chunk::{required_chunks, ChunkedError};
use nexec_core::config::ClientConfig;
use nexec_core::sim::FlakyTransport;
use nexec_core::Client;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub payload_size: usize,
    pub fail_rate: f64,
    pub pending_rate: f64,
    pub reject_rate: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub index: u32,
    pub node: String,
    pub attempts: u32,
    pub receipt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub payload_size: usize,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    /// Network calls made across all chunks.
    pub sends: u64,
    pub chunks: Vec<ChunkReport>,
    pub error: Option<String>,
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

pub async fn simulate(cfg: &ClientConfig, opts: &SimulateOptions) -> Result<SimulationReport> {
    let seed = opts.seed.or(cfg.seed).unwrap_or_else(clock_seed);
    let mut cfg = cfg.clone();
    cfg.seed = Some(seed);

    let transport = Arc::new(
        FlakyTransport::new(seed)
            .fail_rate(opts.fail_rate)
            .pending_rate(opts.pending_rate)
            .reject_rate(opts.reject_rate),
    );
    let client = Client::from_config(Arc::clone(&transport), &cfg)?;
    let chunks_total = required_chunks(opts.payload_size, cfg.chunk_limits()?.max_chunk_size);
    let payload: Bytes = (0..opts.payload_size)
        .map(|i| (i % 256) as u8)
        .collect::<Vec<u8>>()
        .into();

    let (done, error) = match client.submit(payload).await {
        Ok(done) => (done, None),
        Err(ChunkedError::Partial {
            responses, source, ..
        }) => (responses, Some(source.to_string())),
        Err(err @ ChunkedError::Plan(_)) => return Err(err.into()),
    };

    let chunks: Vec<ChunkReport> = done
        .into_iter()
        .map(|c| ChunkReport {
            index: c.chunk.map(|i| i.index).unwrap_or(0),
            node: c.node.to_string(),
            attempts: c.attempts,
            receipt: String::from_utf8_lossy(&c.payload).into_owned(),
        })
        .collect();

    Ok(SimulationReport {
        seed,
        payload_size: opts.payload_size,
        chunks_total,
        chunks_completed: chunks.len(),
        sends: transport.sent(),
        chunks,
        error,
    })
}

pub async fn run_simulate(cfg: &ClientConfig, opts: &SimulateOptions, json: bool) -> Result<()> {
    let report = simulate(cfg, opts).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "seed {}: {} bytes in {} chunk(s), {} send(s)",
        report.seed, report.payload_size, report.chunks_total, report.sends
    );
    println!("{:<6} {:<10} {:<9} {}", "CHUNK", "NODE", "ATTEMPTS", "RECEIPT");
    for c in &report.chunks {
        println!("{:<6} {:<10} {:<9} {}", c.index, c.node, c.attempts, c.receipt);
    }
    match &report.error {
        Some(err) => println!(
            "failed after {}/{} chunk(s): {}",
            report.chunks_completed, report.chunks_total, err
        ),
        None => println!("all {} chunk(s) accepted", report.chunks_total),
    }
    Ok(())
}
