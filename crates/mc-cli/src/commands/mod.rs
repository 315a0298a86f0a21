//! CLI command implementations

mod config;
mod connect;
mod list;
mod open;

pub use config::{config_init, config_path, config_show, load_orchestrator_config};
pub use connect::{connect_command, disconnect_command, quit_command};
pub use list::{list_command, scan_command};
pub use open::open_command;

use anyhow::Result;
use mc_core::Port;
use mc_orchestrator::MultiConn;

/// Validate raw port numbers against the configured range
pub fn parse_ports(multi: &MultiConn, values: &[u16]) -> Result<Vec<Port>> {
    values
        .iter()
        .map(|v| multi.config().port_range.port(*v).map_err(Into::into))
        .collect()
}
