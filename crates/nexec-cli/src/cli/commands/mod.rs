//! CLI command handlers, one file per command.

mod config;
mod nodes;
mod simulate;
mod subscribe;

pub use config::run_config;
pub use nodes::run_nodes;
pub use simulate::{run_simulate, SimulateOptions};
pub use subscribe::{run_subscribe, SubscribeOptions};
