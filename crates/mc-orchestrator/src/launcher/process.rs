//! Detached process spawning

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use mc_core::LaunchError;

use super::LaunchRequest;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Start the application in its own process group with piped output.
///
/// The project location is the single argument; no shell is involved.
pub(crate) fn spawn_detached(request: &LaunchRequest) -> Result<Child, LaunchError> {
    let mut std_cmd = std::process::Command::new(&request.executable);
    std_cmd.arg(&request.project_location);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        std_cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(LaunchError::Spawn)?;
    tracing::info!(
        "Started {} (pid {:?})",
        request.executable.display(),
        child.id()
    );

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(drain("stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain("stderr", stderr));
    }

    Ok(child)
}

/// Log the first line of a stream, then keep reading until EOF so the
/// child never blocks on a full pipe.
async fn drain<R: AsyncRead + Unpin>(name: &'static str, stream: R) {
    let mut lines = BufReader::new(stream).lines();
    let mut first = true;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if first => {
                tracing::debug!("Launched application {}: {}", name, line);
                first = false;
            }
            Ok(Some(line)) => tracing::trace!("Launched application {}: {}", name, line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading {}: {}", name, e);
                break;
            }
        }
    }
}
