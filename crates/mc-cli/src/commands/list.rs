//! Scan and list command implementations

use anyhow::{Context, Result};

use mc_orchestrator::MultiConn;

use crate::output::{format_headers, print_info};

/// Execute the scan command
pub async fn scan_command(multi: &MultiConn) -> Result<()> {
    let live = multi.refresh_all().await;
    print_info(&format!(
        "Scanned {} port(s) in {}, {} live",
        multi.all_ports().len(),
        multi.config().port_range,
        live.len()
    ));
    println!("{}", format_headers(&multi.headers()));
    Ok(())
}

/// Execute the list command
pub async fn list_command(multi: &MultiConn, json: bool) -> Result<()> {
    multi.refresh_all().await;
    let headers = multi.headers();

    if json {
        let output =
            serde_json::to_string_pretty(&headers).context("Failed to serialize headers")?;
        println!("{}", output);
    } else {
        println!("{}", format_headers(&headers));
    }
    Ok(())
}
