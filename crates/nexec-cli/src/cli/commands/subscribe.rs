//! `nexec subscribe` – stream simulated items, optionally unsubscribing
//! part way through.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use nexec_core::config::ClientConfig;
use nexec_core::request::Request;
use nexec_core::sim::FlakyTransport;
use nexec_core::Client;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    pub items: usize,
    pub stop_after: Option<usize>,
    pub interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeReport {
    pub node: String,
    pub delivered: Vec<String>,
    pub unsubscribed: bool,
    pub error: Option<String>,
}

/// Run one subscription to completion. `on_delivery` sees each item as it arrives.
pub async fn subscribe<F>(
    cfg: &ClientConfig,
    opts: &SubscribeOptions,
    mut on_delivery: F,
) -> Result<SubscribeReport>
where
    F: FnMut(usize, &str),
{
    let transport = Arc::new(
        FlakyTransport::new(cfg.seed.unwrap_or(0)).stream(opts.items, opts.interval),
    );
    let client = Client::from_config(transport, cfg)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let failure = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&failure);

    let request = Request::new(client.new_request_id(), "topic");
    let handle = client
        .subscribe(
            request,
            move |msg| {
                let _ = tx.send(String::from_utf8_lossy(&msg.payload).into_owned());
            },
            move |err| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(err.to_string());
                }
            },
        )
        .await?;

    let mut report = SubscribeReport {
        node: handle.node().to_string(),
        ..SubscribeReport::default()
    };
    while let Some(item) = rx.recv().await {
        report.delivered.push(item);
        on_delivery(report.delivered.len(), report.delivered.last().map_or("", String::as_str));
        if opts.stop_after == Some(report.delivered.len()) {
            report.unsubscribed = handle.unsubscribe();
            break;
        }
    }
    handle.finished().await;
    report.error = failure.lock().ok().and_then(|mut slot| slot.take());
    Ok(report)
}

pub async fn run_subscribe(cfg: &ClientConfig, opts: &SubscribeOptions) -> Result<()> {
    let report = subscribe(cfg, opts, |n, item| println!("{:>4}  {}", n, item)).await?;
    if report.unsubscribed {
        println!(
            "unsubscribed from node {} after {} of {} item(s)",
            report.node,
            report.delivered.len(),
            opts.items
        );
    } else {
        println!(
            "stream from node {} ended after {} item(s)",
            report.node,
            report.delivered.len()
        );
    }
    if let Some(err) = report.error {
        println!("stream failed: {}", err);
    }
    Ok(())
}
