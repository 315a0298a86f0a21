//! Process launcher and port finder
//!
//! Starts a new application instance on a project and waits until it binds
//! a port in the managed range. Waiting is bounded by the launch timeout and
//! can be cancelled through a [`CancellationToken`].

mod dialog;
mod ports;
mod process;

pub use dialog::DialogHandler;
pub use ports::{parse_lsof_output, parse_netstat_output, ListenerProbe, SystemListenerProbe};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use mc_core::config::LaunchConfig;
use mc_core::{LaunchError, Port, PortRange};

/// What to start: the executable and its single project argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Application executable
    pub executable: PathBuf,
    /// Project path or teamwork location
    pub project_location: String,
}

/// Per-launch collaborators and overrides
#[derive(Clone, Default)]
pub struct LaunchOptions {
    /// Dialog handler active while waiting for the port
    pub dialog_handler: Option<Arc<dyn DialogHandler>>,
    /// Cancels the wait
    pub cancel: CancellationToken,
    /// Overrides the configured launch timeout
    pub timeout: Option<Duration>,
}

/// Spawns application instances and finds the port they bind
pub struct ProcessLauncher {
    port_range: PortRange,
    config: LaunchConfig,
    probe: Arc<dyn ListenerProbe>,
}

impl ProcessLauncher {
    /// Create a launcher inspecting sockets through `probe`
    pub fn new(port_range: PortRange, config: LaunchConfig, probe: Arc<dyn ListenerProbe>) -> Self {
        Self {
            port_range,
            config,
            probe,
        }
    }

    /// Create a launcher using the operating system's socket lister
    pub fn system(port_range: PortRange, config: LaunchConfig) -> Self {
        Self::new(port_range, config, Arc::new(SystemListenerProbe))
    }

    /// Start the application and return the managed port it binds
    pub async fn launch(
        &self,
        request: &LaunchRequest,
        options: &LaunchOptions,
    ) -> Result<Port, LaunchError> {
        let mut child = process::spawn_detached(request)?;
        let pid = child.id().ok_or_else(|| LaunchError::ProcessExitedEarly {
            status: "exited before its pid could be read".to_string(),
        })?;

        if let Some(handler) = &options.dialog_handler {
            handler.start(pid);
        }

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let result = self
            .wait_for_port(&mut child, pid, timeout, &options.cancel)
            .await;

        if let Some(handler) = &options.dialog_handler {
            handler.stop();
        }

        match &result {
            Ok(port) => tracing::info!("Launched instance (pid {}) bound port {}", pid, port),
            Err(e) => tracing::warn!("Launch of pid {} failed: {}", pid, e),
        }
        result
    }

    async fn wait_for_port(
        &self,
        child: &mut Child,
        pid: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Port, LaunchError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(LaunchError::Cancelled),
                _ = &mut deadline => return Err(LaunchError::LaunchTimedOut(timeout)),
                _ = interval.tick() => {
                    if let Some(status) = child.try_wait().map_err(LaunchError::Spawn)? {
                        return Err(LaunchError::ProcessExitedEarly {
                            status: status.to_string(),
                        });
                    }

                    match self.probe.listening_ports(pid).await {
                        Ok(ports) => {
                            if let Some(port) = self.first_managed(&ports) {
                                return Ok(port);
                            }
                            tracing::trace!("pid {} not listening in {} yet", pid, self.port_range);
                        }
                        Err(e) => tracing::warn!("Listening-port check for pid {} failed: {}", pid, e),
                    }
                }
            }
        }
    }

    fn first_managed(&self, ports: &[u16]) -> Option<Port> {
        ports.iter().find_map(|p| self.port_range.port(*p).ok())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Reports the given ports once `after` checks have passed
    struct ScriptedProbe {
        ports: Vec<u16>,
        after: usize,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl ListenerProbe for ScriptedProbe {
        async fn listening_ports(&self, _pid: u32) -> Result<Vec<u16>, LaunchError> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst);
            if n >= self.after {
                Ok(self.ports.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[derive(Default)]
    struct RecordingDialogs {
        events: Mutex<Vec<String>>,
    }

    impl DialogHandler for RecordingDialogs {
        fn start(&self, pid: u32) {
            self.events.lock().unwrap().push(format!("start {pid}"));
        }

        fn stop(&self) {
            self.events.lock().unwrap().push("stop".to_string());
        }
    }

    fn launcher(ports: Vec<u16>, after: usize) -> ProcessLauncher {
        let config = LaunchConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
        };
        let probe = ScriptedProbe {
            ports,
            after,
            checks: AtomicUsize::new(0),
        };
        ProcessLauncher::new(PortRange::default(), config, Arc::new(probe))
    }

    /// `sleep <seconds>` stands in for the application
    fn sleeper(seconds: &str) -> LaunchRequest {
        LaunchRequest {
            executable: "sleep".into(),
            project_location: seconds.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_managed_port_wins() {
        let launcher = launcher(vec![8080, 19731, 19725], 2);
        let port = launcher
            .launch(&sleeper("5"), &LaunchOptions::default())
            .await
            .unwrap();
        assert_eq!(port.get(), 19731);
    }

    #[tokio::test]
    async fn test_process_exiting_early() {
        let launcher = launcher(Vec::new(), 0);
        let request = LaunchRequest {
            executable: "sh".into(),
            project_location: "-c".to_string(),
        };
        let err = launcher
            .launch(&request, &LaunchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ProcessExitedEarly { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_launch_times_out() {
        let launcher = launcher(vec![8080], 0);
        let options = LaunchOptions {
            timeout: Some(Duration::from_millis(150)),
            ..Default::default()
        };
        let err = launcher.launch(&sleeper("5"), &options).await.unwrap_err();
        assert!(matches!(err, LaunchError::LaunchTimedOut(t) if t == Duration::from_millis(150)));
    }

    #[tokio::test]
    async fn test_launch_cancelled() {
        let launcher = launcher(Vec::new(), 0);
        let options = LaunchOptions::default();
        let cancel = options.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = launcher.launch(&sleeper("5"), &options).await.unwrap_err();
        assert!(matches!(err, LaunchError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let launcher = launcher(Vec::new(), 0);
        let request = LaunchRequest {
            executable: "/nonexistent/multiconn-test-app".into(),
            project_location: "project.pln".to_string(),
        };
        let err = launcher
            .launch(&request, &LaunchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_dialog_handler_brackets_polling() {
        let launcher = launcher(vec![19723], 0);
        let dialogs = Arc::new(RecordingDialogs::default());
        let options = LaunchOptions {
            dialog_handler: Some(dialogs.clone()),
            ..Default::default()
        };

        launcher.launch(&sleeper("5"), &options).await.unwrap();

        let events = dialogs.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("start "));
        assert_eq!(events[1], "stop");
    }
}
