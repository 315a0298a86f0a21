//! Connect, disconnect and quit command implementations

use anyhow::Result;

use mc_orchestrator::MultiConn;

use super::parse_ports;
use crate::output::{format_statuses, print_status, print_success, print_warning};

/// Execute the connect command; no ports means every live instance
pub async fn connect_command(multi: &MultiConn, ports: &[u16]) -> Result<()> {
    let ports = parse_ports(multi, ports)?;
    multi.refresh_all().await;

    let headers = if ports.is_empty() {
        multi.connect_all().await
    } else {
        multi.connect_ports(&ports).await
    };

    if headers.is_empty() {
        print_warning("No instances to connect");
        return Ok(());
    }
    for header in &headers {
        print_status(header.port(), header.status());
    }
    Ok(())
}

/// Execute the disconnect command
pub async fn disconnect_command(multi: &MultiConn, ports: &[u16]) -> Result<()> {
    let ports = parse_ports(multi, ports)?;
    multi.refresh_all().await;

    let headers = if ports.is_empty() {
        multi.disconnect_all().await
    } else {
        multi.disconnect_ports(&ports).await
    };
    println!("{}", format_statuses(&headers));
    Ok(())
}

/// Execute the quit command
pub async fn quit_command(multi: &MultiConn, ports: &[u16]) -> Result<()> {
    let ports = parse_ports(multi, ports)?;
    multi.refresh_all().await;

    let headers = if ports.is_empty() {
        multi.quit_all().await
    } else {
        multi.quit_ports(&ports).await
    };

    if headers.is_empty() {
        print_warning("No instances to quit");
    }
    for header in &headers {
        print_success(&format!(
            "Asked instance on port {} to quit ({})",
            header.port(),
            header.status()
        ));
    }
    Ok(())
}
