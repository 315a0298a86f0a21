//! Listening-socket inspection for a launched process
//!
//! The system probe shells out to the platform socket lister:
//! - **Unix**: `lsof -a -nP -p <pid> -iTCP -sTCP:LISTEN -Fn`
//! - **Windows**: `netstat -ano -p TCP`, filtered to the pid

use async_trait::async_trait;
use tokio::process::Command;

use mc_core::LaunchError;

/// Lists the TCP ports a process is listening on
#[async_trait]
pub trait ListenerProbe: Send + Sync {
    /// Ports `pid` currently listens on, in the order reported
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>, LaunchError>;
}

/// [`ListenerProbe`] backed by the operating system's socket lister
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemListenerProbe;

#[async_trait]
impl ListenerProbe for SystemListenerProbe {
    #[cfg(not(windows))]
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>, LaunchError> {
        let output = Command::new("lsof")
            .args(["-a", "-nP", "-p"])
            .arg(pid.to_string())
            .args(["-iTCP", "-sTCP:LISTEN", "-Fn"])
            .output()
            .await
            .map_err(|e| LaunchError::PortInspection(format!("Failed to run lsof: {}", e)))?;

        // lsof exits non-zero when the process has no matching sockets yet
        Ok(parse_lsof_output(&String::from_utf8_lossy(&output.stdout)))
    }

    #[cfg(windows)]
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>, LaunchError> {
        let output = Command::new("netstat")
            .args(["-ano", "-p", "TCP"])
            .output()
            .await
            .map_err(|e| LaunchError::PortInspection(format!("Failed to run netstat: {}", e)))?;

        if !output.status.success() {
            return Err(LaunchError::PortInspection(format!(
                "netstat exited with {}",
                output.status
            )));
        }
        Ok(parse_netstat_output(&String::from_utf8_lossy(&output.stdout), pid))
    }
}

/// Extract ports from `lsof -Fn` field output.
///
/// Each socket yields an `n<address>:<port>` line; process (`p`) and file
/// descriptor (`f`) lines are skipped.
pub fn parse_lsof_output(output: &str) -> Vec<u16> {
    let mut ports = Vec::new();
    for line in output.lines() {
        let Some(name) = line.strip_prefix('n') else {
            continue;
        };
        if let Some(port) = port_of_address(name) {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
    }
    ports
}

/// Extract the listening ports owned by `pid` from `netstat -ano` output
pub fn parse_netstat_output(output: &str, pid: u32) -> Vec<u16> {
    let mut ports = Vec::new();
    for line in output.lines() {
        // Proto  Local Address  Foreign Address  State  PID
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() != 5 || !columns[0].eq_ignore_ascii_case("TCP") {
            continue;
        }
        if columns[3] != "LISTENING" || columns[4].parse::<u32>().ok() != Some(pid) {
            continue;
        }
        if let Some(port) = port_of_address(columns[1]) {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
    }
    ports
}

fn port_of_address(address: &str) -> Option<u16> {
    let (_, port) = address.rsplit_once(':')?;
    port.parse().ok()
}
