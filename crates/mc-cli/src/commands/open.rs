//! Open command implementation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use mc_core::TeamworkCredentials;
use mc_orchestrator::{ConnectionHeader, LaunchOptions, MultiConn};

use crate::output::{print_info, print_success};

/// Execute the open command.
///
/// Reads a serialized header (as printed by `list --json`) and opens its
/// project in a new instance. Ctrl-C cancels the wait for the new port.
pub async fn open_command(
    multi: &MultiConn,
    header_path: &Path,
    credentials: Option<TeamworkCredentials>,
    timeout: Option<Duration>,
) -> Result<()> {
    let content = std::fs::read_to_string(header_path)
        .with_context(|| format!("Failed to read header file: {:?}", header_path))?;
    let header: ConnectionHeader =
        serde_json::from_str(&content).context("Failed to parse header file")?;

    // Register running instances so an already-open project is detected
    multi.refresh_all().await;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let options = LaunchOptions {
        cancel,
        timeout,
        ..Default::default()
    };

    if let Ok(identity) = header.project_identity() {
        print_info(&format!("Opening '{}'...", identity.name()));
    }
    let result = multi
        .open_project_with(&header, credentials.as_ref(), options)
        .await;
    watcher.abort();

    let port = result?;
    print_success(&format!("Project open on port {}", port));
    Ok(())
}
