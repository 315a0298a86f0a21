//! mc-core: Core abstractions and configuration for multiconn
//!
//! This crate provides the domain types (ports, status, identity records),
//! the error taxonomy, the transport trait and the configuration structures
//! used by the orchestrator and the CLI.

pub mod config;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;

pub use error::{ConfigError, LaunchError, McError, SessionError, TransportError, ValidationError};
pub use identity::{ApplicationLocation, ProductInfo, ProjectIdentity, TeamworkCredentials};
pub use traits::CommandTransport;
pub use types::{Port, PortRange, Status};
