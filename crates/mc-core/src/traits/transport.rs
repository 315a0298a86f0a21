//! Transport trait

use async_trait::async_trait;
use serde_json::Value;

use mc_protocol::{CommandRequest, DEFAULT_ADD_ON_NAMESPACE};

use crate::error::TransportError;
use crate::types::Port;

/// Abstraction over the JSON command channel to application instances.
///
/// The orchestrator only talks to instances through this trait, so tests
/// can substitute an in-memory fake for the HTTP implementation.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Post a command to the instance on `port` and return the decoded body
    async fn post(&self, port: Port, request: &CommandRequest) -> Result<Value, TransportError>;

    /// Issue a liveness probe and return the HTTP status code
    async fn probe(&self, port: Port) -> Result<u16, TransportError>;

    /// Namespace used for add-on commands
    fn add_on_namespace(&self) -> &str {
        DEFAULT_ADD_ON_NAMESPACE
    }

    /// Post an add-on command wrapped in the execute-add-on envelope
    async fn post_add_on(
        &self,
        port: Port,
        name: &str,
        parameters: Value,
    ) -> Result<Value, TransportError> {
        let request = CommandRequest::add_on(self.add_on_namespace(), name, parameters);
        self.post(port, &request).await
    }
}
