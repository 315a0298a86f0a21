//! mc-orchestrator: Connection orchestrator for local application instances
//!
//! The orchestrator discovers running instances by probing the managed port
//! range, tracks each one in a [`ConnectionHeader`], drives connect /
//! disconnect / quit lifecycles across all of them, and launches new
//! instances on a given project.

pub mod connection;
pub mod launcher;
pub mod orchestrator;
pub mod transport;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionHeader, Fetched, HeaderRegistry, Session};
pub use launcher::{DialogHandler, LaunchOptions, LaunchRequest, ListenerProbe, ProcessLauncher};
pub use orchestrator::MultiConn;
pub use transport::HttpTransport;
