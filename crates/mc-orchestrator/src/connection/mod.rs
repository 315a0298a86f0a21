//! Connection management

mod header;
mod registry;
mod session;

pub use header::{ConnectionHeader, Fetched};
pub use registry::HeaderRegistry;
pub use session::Session;
