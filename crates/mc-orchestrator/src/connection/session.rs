//! Live session attached to a connected header

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use mc_core::{CommandTransport, Port, ProductInfo, SessionError};
use mc_protocol::CommandRequest;

/// Handle for application-specific calls on a connected instance.
///
/// Clones share the open flag, so closing one closes every copy handed out
/// in header snapshots.
#[derive(Clone)]
pub struct Session {
    port: Port,
    product_info: ProductInfo,
    transport: Arc<dyn CommandTransport>,
    open: Arc<AtomicBool>,
}

impl Session {
    pub(crate) fn open(
        port: Port,
        product_info: ProductInfo,
        transport: Arc<dyn CommandTransport>,
    ) -> Self {
        tracing::debug!("Opening session on port {} ({})", port, product_info);
        Self {
            port,
            product_info,
            transport,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!("Closed session on port {}", self.port);
        }
    }

    /// Port of the instance
    pub fn port(&self) -> Port {
        self.port
    }

    /// Product info the session was opened with
    pub fn product_info(&self) -> &ProductInfo {
        &self.product_info
    }

    /// Whether the session still accepts calls
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::Closed(self.port))
        }
    }

    /// Execute a core command
    pub async fn execute(&self, command: &str, parameters: Value) -> Result<Value, SessionError> {
        self.ensure_open()?;
        let request = CommandRequest::with_parameters(command, parameters);
        Ok(self.transport.post(self.port, &request).await?)
    }

    /// Execute an add-on command
    pub async fn execute_add_on(&self, name: &str, parameters: Value) -> Result<Value, SessionError> {
        self.ensure_open()?;
        Ok(self.transport.post_add_on(self.port, name, parameters).await?)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("port", &self.port)
            .field("product_info", &self.product_info)
            .field("open", &self.is_open())
            .finish()
    }
}
