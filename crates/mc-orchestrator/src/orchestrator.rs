//! Connection orchestrator
//!
//! [`MultiConn`] owns the header registry. Scans reconcile it with the ports
//! that answer a liveness probe, bulk actions drive header lifecycles, and
//! [`MultiConn::open_project`] launches a new instance and registers it.
//!
//! Transport and API failures never escape a scan; they are recorded in the
//! affected header's fields. Precondition failures of `open_project` are
//! returned to the caller and leave the registry unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use mc_core::config::OrchestratorConfig;
use mc_core::{CommandTransport, LaunchError, McError, Port, Status, TeamworkCredentials};
use crate::connection::{ConnectionHeader, HeaderRegistry};
use crate::launcher::{LaunchOptions, LaunchRequest, ListenerProbe, ProcessLauncher};
use crate::transport::HttpTransport;

/// Manages connections to every application instance in the port range
pub struct MultiConn {
    config: OrchestratorConfig,
    transport: Arc<dyn CommandTransport>,
    registry: HeaderRegistry,
    launcher: ProcessLauncher,
    /// Serializes launches so two identical projects are never opened at once
    launching: Mutex<()>,
}

impl MultiConn {
    /// Create an orchestrator talking HTTP, with an empty registry
    pub fn new(config: OrchestratorConfig) -> Result<Self, McError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create an orchestrator over an injected transport
    pub fn with_transport(config: OrchestratorConfig, transport: Arc<dyn CommandTransport>) -> Self {
        let launcher = ProcessLauncher::system(config.port_range, config.launch.clone());
        Self::build(config, transport, launcher)
    }

    /// Create an orchestrator over an injected transport and listener probe
    pub fn with_parts(
        config: OrchestratorConfig,
        transport: Arc<dyn CommandTransport>,
        probe: Arc<dyn ListenerProbe>,
    ) -> Self {
        let launcher = ProcessLauncher::new(config.port_range, config.launch.clone(), probe);
        Self::build(config, transport, launcher)
    }

    /// Create an HTTP orchestrator and scan the whole port range
    pub async fn discover(config: OrchestratorConfig) -> Result<Self, McError> {
        let multi = Self::new(config)?;
        multi.refresh_all().await;
        Ok(multi)
    }

    fn build(
        config: OrchestratorConfig,
        transport: Arc<dyn CommandTransport>,
        launcher: ProcessLauncher,
    ) -> Self {
        Self {
            config,
            transport,
            registry: HeaderRegistry::new(),
            launcher,
            launching: Mutex::new(()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Transport shared with sessions
    pub fn transport(&self) -> &Arc<dyn CommandTransport> {
        &self.transport
    }

    // ========== Scanning ==========

    /// Probe `ports` concurrently and reconcile the registry.
    ///
    /// Live ports get a new header or a retry of their errored fields; ports
    /// that do not answer 200 are evicted. Returns the live ports in order.
    pub async fn scan(&self, ports: &[Port]) -> Vec<Port> {
        let _bulk = self.registry.read().await;

        let checks = ports.iter().map(|port| self.check_port(*port));
        let mut live: Vec<Port> = ports
            .iter()
            .zip(join_all(checks).await)
            .filter_map(|(port, alive)| alive.then_some(*port))
            .collect();
        live.sort_unstable();
        live.dedup();

        tracing::debug!("Scanned {} port(s), {} live", ports.len(), live.len());
        live
    }

    async fn check_port(&self, port: Port) -> bool {
        let _guard = self.registry.lock_port(port).await;

        let alive = match self.transport.probe(port).await {
            Ok(200) => true,
            Ok(status) => {
                tracing::debug!("Port {} answered probe with {}", port, status);
                false
            }
            Err(e) => {
                tracing::debug!("Port {} not live: {}", port, e);
                false
            }
        };

        if alive {
            match self.registry.get(port) {
                Some(mut header) => {
                    header.refresh_missing(self.transport.as_ref()).await;
                    self.registry.insert(header);
                }
                None => {
                    let header = ConnectionHeader::initialize(port, self.transport.as_ref()).await;
                    tracing::info!("Registered instance on port {}", port);
                    self.registry.insert(header);
                }
            }
        } else if let Some(mut header) = self.registry.remove(port) {
            header.unassign();
            tracing::info!("Evicted instance on port {}", port);
        }

        alive
    }

    /// Scan the whole managed range
    pub async fn refresh_all(&self) -> Vec<Port> {
        self.scan(&self.all_ports()).await
    }

    /// Scan only registered ports
    pub async fn refresh_open(&self) -> Vec<Port> {
        self.scan(&self.open_ports()).await
    }

    /// Scan only unregistered ports
    pub async fn refresh_closed(&self) -> Vec<Port> {
        self.scan(&self.closed_ports()).await
    }

    // ========== Views ==========

    /// Registered headers in PENDING
    pub fn pending(&self) -> BTreeMap<Port, ConnectionHeader> {
        self.registry.with_status(Status::Pending)
    }

    /// Registered headers in ACTIVE
    pub fn active(&self) -> BTreeMap<Port, ConnectionHeader> {
        self.registry.with_status(Status::Active)
    }

    /// Registered headers in FAILED
    pub fn failed(&self) -> BTreeMap<Port, ConnectionHeader> {
        self.registry.with_status(Status::Failed)
    }

    /// Registered headers in UNASSIGNED
    pub fn unassigned(&self) -> BTreeMap<Port, ConnectionHeader> {
        self.registry.with_status(Status::Unassigned)
    }

    /// Ports with a registered header
    pub fn open_ports(&self) -> Vec<Port> {
        self.registry.ports()
    }

    /// Ports of the range without a registered header
    pub fn closed_ports(&self) -> Vec<Port> {
        self.config
            .port_range
            .ports()
            .filter(|port| !self.registry.contains(*port))
            .collect()
    }

    /// Every port of the managed range
    pub fn all_ports(&self) -> Vec<Port> {
        self.config.port_range.ports().collect()
    }

    /// Snapshot of the header on `port`
    pub fn header(&self, port: Port) -> Option<ConnectionHeader> {
        self.registry.get(port)
    }

    /// Snapshot of every header in port order
    pub fn headers(&self) -> Vec<ConnectionHeader> {
        self.registry.snapshot()
    }

    /// Port of a registered header equal to `header`
    pub fn find(&self, header: &ConnectionHeader) -> Option<Port> {
        self.registry.find(header)
    }

    // ========== Bulk actions ==========
    //
    // Each action returns snapshots of the affected headers in port order.

    /// Connect every registered header
    pub async fn connect_all(&self) -> Vec<ConnectionHeader> {
        self.connect_ports(&self.open_ports()).await
    }

    /// Disconnect every registered header
    pub async fn disconnect_all(&self) -> Vec<ConnectionHeader> {
        self.disconnect_ports(&self.open_ports()).await
    }

    /// Ask every registered instance to quit
    pub async fn quit_all(&self) -> Vec<ConnectionHeader> {
        self.quit_ports(&self.open_ports()).await
    }

    /// Connect the headers on `ports`; unregistered ports are skipped
    pub async fn connect_ports(&self, ports: &[Port]) -> Vec<ConnectionHeader> {
        let _bulk = self.registry.write().await;
        let transport = &self.transport;

        let headers = self
            .for_each_header(ports, |mut header| async move {
                header.connect(transport).await;
                header
            })
            .await;

        let failed = headers
            .iter()
            .filter(|h| h.status() == Status::Failed)
            .count();
        tracing::info!("Connected {} instance(s), {} failed", headers.len() - failed, failed);
        headers
    }

    /// Disconnect the headers on `ports`; unregistered ports are skipped
    pub async fn disconnect_ports(&self, ports: &[Port]) -> Vec<ConnectionHeader> {
        let _bulk = self.registry.write().await;

        let headers = self
            .for_each_header(ports, |mut header| async move {
                header.disconnect();
                header
            })
            .await;

        tracing::info!("Disconnected {} instance(s)", headers.len());
        headers
    }

    /// Quit the instances on `ports`; unregistered ports are skipped.
    ///
    /// Quit headers stay registered as UNASSIGNED until a scan finds the
    /// port gone. A rejected quit request is logged, not returned.
    pub async fn quit_ports(&self, ports: &[Port]) -> Vec<ConnectionHeader> {
        let _bulk = self.registry.write().await;
        let transport = &self.transport;

        let headers = self
            .for_each_header(ports, |mut header| async move {
                if let Err(e) = header.quit(transport.as_ref()).await {
                    tracing::warn!("Quit request to port {} failed: {}", header.port(), e);
                }
                header
            })
            .await;

        tracing::info!("Asked {} instance(s) to quit", headers.len());
        headers
    }

    /// Run `action` on a copy of each registered header under its port
    /// guard, write the copy back and collect snapshots in port order.
    async fn for_each_header<F, Fut>(&self, ports: &[Port], action: F) -> Vec<ConnectionHeader>
    where
        F: Fn(ConnectionHeader) -> Fut,
        Fut: std::future::Future<Output = ConnectionHeader>,
    {
        let mut ports = ports.to_vec();
        ports.sort_unstable();
        ports.dedup();

        let action = &action;
        let tasks = ports.into_iter().map(|port| async move {
            let _guard = self.registry.lock_port(port).await;
            let header = action(self.registry.get(port)?).await;
            self.registry.insert(header.clone());
            Some(header)
        });

        join_all(tasks).await.into_iter().flatten().collect()
    }

    // ========== Launching ==========

    /// Open the project of `header` in a new application instance
    pub async fn open_project(
        &self,
        header: &ConnectionHeader,
        credentials: Option<&TeamworkCredentials>,
    ) -> Result<Port, LaunchError> {
        self.open_project_with(header, credentials, LaunchOptions::default())
            .await
    }

    /// Open the project of `header` with a dialog handler, cancellation
    /// token or timeout override.
    ///
    /// The header must be fully initialized, carry a port of the managed
    /// range and no equal header may be registered. On success the new instance's header is registered and
    /// its port returned.
    pub async fn open_project_with(
        &self,
        header: &ConnectionHeader,
        credentials: Option<&TeamworkCredentials>,
        options: LaunchOptions,
    ) -> Result<Port, LaunchError> {
        let (identity, location) = match (header.project_identity(), header.application_location())
        {
            (Ok(identity), Ok(location)) if header.is_fully_initialized() => (identity, location),
            _ => {
                return Err(LaunchError::NotFullyInitialized(format!(
                    "header on port {}",
                    header.port()
                )))
            }
        };

        self.config.port_range.port(header.port().get())?;

        let project_location = identity.project_location(credentials).ok_or_else(|| {
            LaunchError::NotFullyInitialized("untitled project has no location".to_string())
        })?;

        let _launching = self.launching.lock().await;

        if let Some(port) = self.registry.find(header) {
            return Err(LaunchError::AlreadyOpen(port));
        }

        let request = LaunchRequest {
            executable: location.path.clone(),
            project_location,
        };
        tracing::info!("Opening '{}' with {}", identity.name(), request.executable.display());

        let port = self.launcher.launch(&request, &options).await?;

        let _guard = self.registry.lock_port(port).await;
        if let Some(mut stale) = self.registry.remove(port) {
            tracing::warn!("Replacing stale header on port {}", port);
            stale.unassign();
        }
        let launched = ConnectionHeader::initialize(port, self.transport.as_ref()).await;
        self.registry.insert(launched);
        tracing::info!("Registered launched instance on port {}", port);

        Ok(port)
    }
}
