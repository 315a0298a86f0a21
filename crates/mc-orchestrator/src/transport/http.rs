//! HTTP JSON command transport
//!
//! Posts `{"command", "parameters"}` bodies to `http://<host>:<port>` and
//! decodes the JSON reply. One async implementation backs both the async
//! trait methods and the `*_blocking` entry points.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use mc_core::config::OrchestratorConfig;
use mc_core::{CommandTransport, Port, TransportError};
use mc_protocol::CommandRequest;

use super::blocking::block_on;

/// Transport talking to application instances over local HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    request_timeout: Duration,
    probe_timeout: Duration,
    add_on_namespace: String,
}

impl HttpTransport {
    /// Create a transport from orchestrator configuration
    pub fn new(config: &OrchestratorConfig) -> Result<Self, TransportError> {
        // Idle connections would be tied to the runtime that opened them;
        // blocking calls run on throwaway runtimes, so never pool.
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TransportError::Runtime(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.clone(),
            request_timeout: config.request_timeout,
            probe_timeout: config.probe_timeout,
            add_on_namespace: config.add_on_namespace.clone(),
        })
    }

    /// Base URL of the instance on `port`
    pub fn url(&self, port: Port) -> String {
        format!("http://{}:{}", self.host, port)
    }

    async fn send(&self, port: Port, request: &CommandRequest) -> Result<Value, TransportError> {
        tracing::trace!("POST {} -> port {}", request.command, port);

        let response = self
            .client
            .post(self.url(port))
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(port, self.request_timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(port, self.request_timeout, e))?;

        tracing::trace!("Port {} answered {}: {}", port, request.command, body);

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            // Error statuses may still carry a well-formed error response
            Err(_) if !status.is_success() => Err(TransportError::Status {
                port,
                status: status.as_u16(),
            }),
            Err(e) => Err(TransportError::MalformedBody {
                port,
                message: e.to_string(),
            }),
        }
    }

    async fn get_status(&self, port: Port) -> Result<u16, TransportError> {
        let response = self
            .client
            .get(self.url(port))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(port, self.probe_timeout, e))?;
        Ok(response.status().as_u16())
    }

    /// Blocking variant of [`CommandTransport::post`]
    pub fn post_blocking(
        &self,
        port: Port,
        request: &CommandRequest,
    ) -> Result<Value, TransportError> {
        block_on(self.send(port, request))?
    }

    /// Blocking variant of [`CommandTransport::post_add_on`]
    pub fn post_add_on_blocking(
        &self,
        port: Port,
        name: &str,
        parameters: Value,
    ) -> Result<Value, TransportError> {
        let request = CommandRequest::add_on(&self.add_on_namespace, name, parameters);
        self.post_blocking(port, &request)
    }

    /// Blocking variant of [`CommandTransport::probe`]
    pub fn probe_blocking(&self, port: Port) -> Result<u16, TransportError> {
        block_on(self.get_status(port))?
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn post(&self, port: Port, request: &CommandRequest) -> Result<Value, TransportError> {
        self.send(port, request).await
    }

    async fn probe(&self, port: Port) -> Result<u16, TransportError> {
        self.get_status(port).await
    }

    fn add_on_namespace(&self) -> &str {
        &self.add_on_namespace
    }
}

fn map_reqwest_error(port: Port, timeout: Duration, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { port, timeout }
    } else if err.is_connect() {
        TransportError::ConnectionRefused(port)
    } else if err.is_decode() || err.is_body() {
        TransportError::MalformedBody {
            port,
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            port,
            message: err.to_string(),
        }
    }
}
