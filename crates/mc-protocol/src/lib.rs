//! mc-protocol: Wire protocol for multiconn
//!
//! This crate defines the JSON command envelope posted to a running
//! application instance and the decoding of its `succeeded`/`result`/`error`
//! responses into typed records.

pub mod command;
pub mod error;
pub mod response;

pub use command::{commands, AddOnCommandId, CommandRequest, DEFAULT_ADD_ON_NAMESPACE};
pub use error::ProtocolError;
pub use response::{resolve, try_resolve, ApiError, FromApiResponse};
