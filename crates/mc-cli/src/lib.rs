//! multiconn: Command-line interface over the connection orchestrator
//!
//! Provides the `multiconn` binary for scanning the port range, driving
//! connection lifecycles and opening projects in new instances.

pub mod commands;
pub mod output;
