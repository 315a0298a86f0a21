//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use mc_protocol::DEFAULT_ADD_ON_NAMESPACE;

use super::serde_utils::{duration_millis, duration_secs};
use crate::types::PortRange;

/// Configuration for the connection orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Host the application instances listen on
    pub host: String,

    /// Timeout of a single liveness probe
    #[serde(with = "duration_millis")]
    pub probe_timeout: Duration,

    /// Timeout of a single command request
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// Namespace of the add-on answering identity queries
    pub add_on_namespace: String,

    /// Ports an application instance may bind
    pub port_range: PortRange,

    /// Process launch settings
    pub launch: LaunchConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            probe_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            add_on_namespace: DEFAULT_ADD_ON_NAMESPACE.to_string(),
            port_range: PortRange::default(),
            launch: LaunchConfig::default(),
        }
    }
}

/// How long and how often to wait for a launched instance to bind a port
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Give up after this long
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Interval between listening-socket checks
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}
