//! `nexec nodes` – list the configured node directory.

use anyhow::Result;
use nexec_core::config::ClientConfig;
use nexec_core::node::NodeDirectory;

pub fn run_nodes(cfg: &ClientConfig) -> Result<()> {
    let directory = NodeDirectory::from_config(cfg)?;
    if directory.is_empty() {
        println!("No nodes configured.");
        return Ok(());
    }
    println!("{:<12} {}", "ID", "ADDRESS");
    for node in directory.nodes() {
        println!("{:<12} {}", node.id(), node.address());
    }
    Ok(())
}
