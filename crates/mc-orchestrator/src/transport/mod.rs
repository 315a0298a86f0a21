//! Command transport implementations

mod blocking;
mod http;

pub use blocking::block_on;
pub use http::HttpTransport;
