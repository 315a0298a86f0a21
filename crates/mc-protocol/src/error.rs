//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding a response whose shape is not what the
/// command contract promises
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A required key is absent from the response
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    /// The response body could not be decoded into the expected record
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response was decoded but violates the record's own rules
    #[error("Invalid value: {0}")]
    Invalid(String),
}
