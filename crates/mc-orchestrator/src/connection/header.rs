//! Per-port connection header
//!
//! A header aggregates everything known about one application instance: its
//! port, lifecycle status and three metadata fields. Each field holds either
//! the decoded record or the [`ApiError`] that prevented decoding, so a
//! header can be partially initialized and is repaired field by field.
//!
//! # Lifecycle
//!
//! ```text
//!            connect (product info ok)
//! PENDING ───────────────────────────────► ACTIVE
//!    │  ▲                                     │
//!    │  └──────────── disconnect ─────────────┤
//!    │ connect (product info error)           │ unassign / quit
//!    ▼                                        ▼
//! FAILED                                 UNASSIGNED
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mc_core::{
    ApplicationLocation, CommandTransport, Port, ProductInfo, ProjectIdentity, Status,
};
use mc_protocol::{commands, resolve, ApiError, CommandRequest, FromApiResponse};

use super::session::Session;

/// A metadata field: the decoded record or the error that replaced it
pub type Fetched<T> = Result<T, ApiError>;

/// Everything known about the instance on one port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionHeader {
    port: Port,
    status: Status,
    product_info: Fetched<ProductInfo>,
    project_identity: Fetched<ProjectIdentity>,
    application_location: Fetched<ApplicationLocation>,
    #[serde(skip)]
    session: Option<Session>,
}

async fn fetch<T: FromApiResponse>(
    transport: &dyn CommandTransport,
    port: Port,
    request: CommandRequest,
) -> Fetched<T> {
    match transport.post(port, &request).await {
        Ok(response) => resolve(&response),
        Err(e) => {
            tracing::warn!("{} on port {} failed: {}", request.command, port, e);
            Err(ApiError::transport(e.to_string()))
        }
    }
}

impl ConnectionHeader {
    /// Create a pending header from already-known fields
    pub fn new(
        port: Port,
        product_info: Fetched<ProductInfo>,
        project_identity: Fetched<ProjectIdentity>,
        application_location: Fetched<ApplicationLocation>,
    ) -> Self {
        Self {
            port,
            status: Status::Pending,
            product_info,
            project_identity,
            application_location,
            session: None,
        }
    }

    /// Create a header by fetching all three fields concurrently
    pub async fn initialize(port: Port, transport: &dyn CommandTransport) -> Self {
        let (product_info, project_identity, application_location) = tokio::join!(
            fetch_product_info(transport, port),
            fetch_project_identity(transport, port),
            fetch_application_location(transport, port),
        );

        let header = Self::new(port, product_info, project_identity, application_location);
        tracing::info!(
            "Initialized header on port {} (fully initialized: {})",
            port,
            header.is_fully_initialized()
        );
        header
    }

    /// Port of the instance
    pub fn port(&self) -> Port {
        self.port
    }

    /// Current lifecycle status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Product info or the error that replaced it
    pub fn product_info(&self) -> &Fetched<ProductInfo> {
        &self.product_info
    }

    /// Project identity or the error that replaced it
    pub fn project_identity(&self) -> &Fetched<ProjectIdentity> {
        &self.project_identity
    }

    /// Application location or the error that replaced it
    pub fn application_location(&self) -> &Fetched<ApplicationLocation> {
        &self.application_location
    }

    /// The live session, present while ACTIVE
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether every metadata field holds a record
    pub fn is_fully_initialized(&self) -> bool {
        self.product_info.is_ok()
            && self.project_identity.is_ok()
            && self.application_location.is_ok()
    }

    /// Re-fetch the product info, replacing only that field
    pub async fn fetch_product_info(
        &mut self,
        transport: &dyn CommandTransport,
    ) -> &Fetched<ProductInfo> {
        self.product_info = fetch_product_info(transport, self.port).await;
        &self.product_info
    }

    /// Re-fetch the project identity, replacing only that field
    pub async fn fetch_project_identity(
        &mut self,
        transport: &dyn CommandTransport,
    ) -> &Fetched<ProjectIdentity> {
        self.project_identity = fetch_project_identity(transport, self.port).await;
        &self.project_identity
    }

    /// Re-fetch the application location, replacing only that field
    pub async fn fetch_application_location(
        &mut self,
        transport: &dyn CommandTransport,
    ) -> &Fetched<ApplicationLocation> {
        self.application_location = fetch_application_location(transport, self.port).await;
        &self.application_location
    }

    /// Re-fetch every field that currently holds an error.
    ///
    /// Returns how many fields were retried.
    pub async fn refresh_missing(&mut self, transport: &dyn CommandTransport) -> usize {
        let mut retried = 0;
        if self.product_info.is_err() {
            self.fetch_product_info(transport).await;
            retried += 1;
        }
        if self.project_identity.is_err() {
            self.fetch_project_identity(transport).await;
            retried += 1;
        }
        if self.application_location.is_err() {
            self.fetch_application_location(transport).await;
            retried += 1;
        }
        if retried > 0 {
            tracing::debug!("Retried {} field(s) on port {}", retried, self.port);
        }
        retried
    }

    /// Open a session and become ACTIVE, or become FAILED.
    ///
    /// A product info error is retried once before giving up.
    pub async fn connect(&mut self, transport: &Arc<dyn CommandTransport>) -> Status {
        if self.product_info.is_err() {
            self.fetch_product_info(transport.as_ref()).await;
        }

        match self.product_info.clone() {
            Ok(info) => {
                self.close_session();
                self.session = Some(Session::open(self.port, info, Arc::clone(transport)));
                self.status = Status::Active;
            }
            Err(e) => {
                tracing::warn!("Cannot connect port {}: {}", self.port, e);
                self.status = Status::Failed;
            }
        }
        self.status
    }

    /// Close the session and return to PENDING
    pub fn disconnect(&mut self) {
        self.close_session();
        self.status = Status::Pending;
    }

    /// Close the session and mark the header UNASSIGNED
    pub fn unassign(&mut self) {
        self.close_session();
        self.status = Status::Unassigned;
    }

    /// Ask the instance to quit, then unassign.
    ///
    /// The header is unassigned even when the request fails; the next scan
    /// evicts it once the port stops answering.
    pub async fn quit(&mut self, transport: &dyn CommandTransport) -> Fetched<()> {
        tracing::info!("Quitting instance on port {}", self.port);
        let result = transport
            .post_add_on(self.port, commands::QUIT_ARCHICAD, Value::Null)
            .await
            .map_err(|e| ApiError::transport(e.to_string()))
            .and_then(|response| resolve::<()>(&response));
        self.unassign();
        result
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

impl PartialEq for ConnectionHeader {
    /// Headers are equal when both are fully initialized and describe the
    /// same instance; port and status are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.is_fully_initialized()
            && other.is_fully_initialized()
            && self.product_info == other.product_info
            && self.project_identity == other.project_identity
            && self.application_location == other.application_location
    }
}

async fn fetch_product_info(transport: &dyn CommandTransport, port: Port) -> Fetched<ProductInfo> {
    fetch(transport, port, CommandRequest::new(commands::GET_PRODUCT_INFO)).await
}

async fn fetch_project_identity(
    transport: &dyn CommandTransport,
    port: Port,
) -> Fetched<ProjectIdentity> {
    let request = CommandRequest::add_on(
        transport.add_on_namespace(),
        commands::GET_PROJECT_INFO,
        Value::Null,
    );
    fetch(transport, port, request).await
}

async fn fetch_application_location(
    transport: &dyn CommandTransport,
    port: Port,
) -> Fetched<ApplicationLocation> {
    let request = CommandRequest::add_on(
        transport.add_on_namespace(),
        commands::GET_ARCHICAD_LOCATION,
        Value::Null,
    );
    fetch(transport, port, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeTransport};

    fn port(value: u16) -> Port {
        Port::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_fully() {
        let fake = FakeTransport::new().with_solo(port(19723), "House");
        let header = ConnectionHeader::initialize(port(19723), &fake).await;

        assert!(header.is_fully_initialized());
        assert_eq!(header.status(), Status::Pending);
        assert_eq!(header.product_info().as_ref().unwrap().version, 27);
        assert_eq!(header.project_identity().as_ref().unwrap().name(), "House");
    }

    #[tokio::test]
    async fn test_initialize_partially() {
        let fake = FakeTransport::new().with_solo(port(19723), "House");
        fake.set_response(
            port(19723),
            commands::GET_PROJECT_INFO,
            testing::api_error(4001, "Add-on missing"),
        );

        let header = ConnectionHeader::initialize(port(19723), &fake).await;
        assert!(!header.is_fully_initialized());
        assert!(header.product_info().is_ok());
        assert_eq!(header.project_identity().as_ref().unwrap_err().code, 4001);
        assert!(header.application_location().is_ok());
    }

    #[tokio::test]
    async fn test_refresh_missing_only_retries_errors() {
        let fake = FakeTransport::new().with_solo(port(19723), "House");
        fake.set_response(
            port(19723),
            commands::GET_ARCHICAD_LOCATION,
            testing::api_error(4001, "not ready"),
        );
        let mut header = ConnectionHeader::initialize(port(19723), &fake).await;
        assert!(header.application_location().is_err());

        fake.set_response(port(19723), commands::GET_ARCHICAD_LOCATION, testing::location("/opt/ac"));
        let retried = header.refresh_missing(&fake).await;

        assert_eq!(retried, 1);
        assert!(header.is_fully_initialized());
        assert_eq!(fake.calls(port(19723), commands::GET_PRODUCT_INFO), 1);
        assert_eq!(fake.calls(port(19723), commands::GET_ARCHICAD_LOCATION), 2);

        assert_eq!(header.refresh_missing(&fake).await, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_field_error() {
        let fake = FakeTransport::new();
        let header = ConnectionHeader::initialize(port(19730), &fake).await;
        let err = header.product_info().as_ref().unwrap_err();
        assert_eq!(err.code, ApiError::TRANSPORT_FAILURE);
    }

    #[tokio::test]
    async fn test_connect_disconnect_unassign() {
        let fake = Arc::new(FakeTransport::new().with_solo(port(19723), "House"));
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut header = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;

        assert_eq!(header.connect(&transport).await, Status::Active);
        let session = header.session().cloned().unwrap();
        assert!(session.is_open());
        assert!(session.execute(commands::GET_PRODUCT_INFO, Value::Null).await.is_ok());

        header.disconnect();
        assert_eq!(header.status(), Status::Pending);
        assert!(header.session().is_none());
        assert!(!session.is_open());
        assert!(session.execute(commands::GET_PRODUCT_INFO, Value::Null).await.is_err());

        header.connect(&transport).await;
        header.unassign();
        assert_eq!(header.status(), Status::Unassigned);
        assert!(header.session().is_none());
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let fake = Arc::new(FakeTransport::new().with_solo(port(19723), "House"));
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut header = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;

        header.connect(&transport).await;
        let first = header.session().cloned().unwrap();
        assert_eq!(header.connect(&transport).await, Status::Active);
        let second = header.session().cloned().unwrap();

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(second.product_info(), header.product_info().as_ref().unwrap());
    }

    #[tokio::test]
    async fn test_connect_fails_without_product_info() {
        let fake = Arc::new(FakeTransport::new().with_solo(port(19723), "House"));
        fake.set_response(port(19723), commands::GET_PRODUCT_INFO, testing::api_error(1, "busy"));
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut header = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;

        assert_eq!(header.connect(&transport).await, Status::Failed);
        assert!(header.session().is_none());
        // Initial fetch plus the retry inside connect
        assert_eq!(fake.calls(port(19723), commands::GET_PRODUCT_INFO), 2);
    }

    #[tokio::test]
    async fn test_connect_retries_product_info() {
        let fake = Arc::new(FakeTransport::new().with_solo(port(19723), "House"));
        fake.set_response(port(19723), commands::GET_PRODUCT_INFO, testing::api_error(1, "busy"));
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut header = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;

        fake.set_response(port(19723), commands::GET_PRODUCT_INFO, testing::product_info(27));
        assert_eq!(header.connect(&transport).await, Status::Active);
    }

    #[tokio::test]
    async fn test_quit_unassigns() {
        let fake = Arc::new(FakeTransport::new().with_solo(port(19723), "House"));
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut header = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;
        header.connect(&transport).await;

        assert!(header.quit(fake.as_ref()).await.is_ok());
        assert_eq!(header.status(), Status::Unassigned);
        assert_eq!(fake.calls(port(19723), commands::QUIT_ARCHICAD), 1);
        assert!(!fake.is_alive(port(19723)));
    }

    #[tokio::test]
    async fn test_equality_ignores_status_and_port() {
        let fake = Arc::new(
            FakeTransport::new()
                .with_solo(port(19723), "House")
                .with_solo(port(19724), "House"),
        );
        let transport: Arc<dyn CommandTransport> = fake.clone();
        let mut a = ConnectionHeader::initialize(port(19723), fake.as_ref()).await;
        let b = ConnectionHeader::initialize(port(19724), fake.as_ref()).await;

        a.connect(&transport).await;
        assert_eq!(a.status(), Status::Active);
        assert_eq!(b.status(), Status::Pending);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_partial_headers_never_equal() {
        let fake = FakeTransport::new().with_solo(port(19723), "House");
        fake.set_response(port(19723), commands::GET_ARCHICAD_LOCATION, testing::api_error(1, "x"));
        let header = ConnectionHeader::initialize(port(19723), &fake).await;

        assert_ne!(header, header.clone());
    }

    #[tokio::test]
    async fn test_serde_round_trip() {
        let fake = FakeTransport::new().with_solo(port(19723), "House");
        fake.set_response(port(19723), commands::GET_ARCHICAD_LOCATION, testing::api_error(7, "x"));
        let header = ConnectionHeader::initialize(port(19723), &fake).await;

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["port"], 19723);
        assert_eq!(value["status"], "pending");

        let restored: ConnectionHeader = serde_json::from_value(value).unwrap();
        assert_eq!(restored.port(), header.port());
        assert_eq!(restored.status(), header.status());
        assert_eq!(restored.product_info(), header.product_info());
        assert_eq!(restored.project_identity(), header.project_identity());
        assert_eq!(restored.application_location(), header.application_location());
        assert!(restored.session().is_none());
    }

    #[test]
    fn test_fully_initialized_round_trip_is_equal() {
        let header = ConnectionHeader::new(
            port(19725),
            Ok(ProductInfo::new(27, 4001, "INT")),
            Ok(ProjectIdentity::Untitled),
            Ok(ApplicationLocation::new("/opt/ac")),
        );
        let restored: ConnectionHeader =
            serde_json::from_value(serde_json::to_value(&header).unwrap()).unwrap();
        assert_eq!(restored, header);
    }

    #[test]
    fn test_custom_range_header_round_trip() {
        let range = mc_core::PortRange::new(40000, 40010).unwrap();
        let header = ConnectionHeader::new(
            range.port(40005).unwrap(),
            Ok(ProductInfo::new(27, 4001, "INT")),
            Ok(ProjectIdentity::Solo {
                path: "/projects/tower.pln".into(),
                name: "Tower".to_string(),
            }),
            Ok(ApplicationLocation::new("/opt/ac")),
        );

        let restored: ConnectionHeader =
            serde_json::from_str(&serde_json::to_string(&header).unwrap()).unwrap();
        assert_eq!(restored.port().get(), 40005);
        assert_eq!(restored, header);
    }
}
