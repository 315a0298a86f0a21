//! Response decoding
//!
//! Every response is either `{"succeeded": true, "result": {...}}` or
//! `{"succeeded": false, "error": {"code": .., "message": ..}}`. [`resolve`] is
//! the one place raw responses turn into typed records.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ProtocolError;

/// A failure reported by the application itself
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[error("API error {code}: {message}")]
pub struct ApiError {
    /// Error code reported by the application
    pub code: i64,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    /// Code used when the request never produced a response
    pub const TRANSPORT_FAILURE: i64 = -1;
    /// Code used when the response did not match the command contract
    pub const MALFORMED_RESPONSE: i64 = -2;

    /// Create a new API error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// An error standing in for a request that failed below the API
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(Self::TRANSPORT_FAILURE, message)
    }

    /// An error standing in for an undecodable response
    pub fn malformed(err: &ProtocolError) -> Self {
        Self::new(Self::MALFORMED_RESPONSE, err.to_string())
    }

    /// Whether this error was produced locally rather than by the application
    pub fn is_local(&self) -> bool {
        matches!(self.code, Self::TRANSPORT_FAILURE | Self::MALFORMED_RESPONSE)
    }
}

/// Records that can be decoded from a successful command response
pub trait FromApiResponse: Sized {
    /// Decode from the full response object (including `succeeded`)
    fn from_api_response(response: &Value) -> Result<Self, ProtocolError>;
}

/// Plain acknowledgement: any successful response decodes
impl FromApiResponse for () {
    fn from_api_response(_response: &Value) -> Result<Self, ProtocolError> {
        Ok(())
    }
}

/// Decode a response, keeping malformed responses distinct from API errors.
pub fn try_resolve<T: FromApiResponse>(
    response: &Value,
) -> Result<Result<T, ApiError>, ProtocolError> {
    let succeeded = response
        .get("succeeded")
        .ok_or(ProtocolError::MissingField("succeeded"))?
        .as_bool()
        .ok_or_else(|| ProtocolError::Invalid("`succeeded` is not a boolean".into()))?;

    if succeeded {
        T::from_api_response(response).map(Ok)
    } else {
        let error = response
            .get("error")
            .ok_or(ProtocolError::MissingField("error"))?;
        let error = ApiError::deserialize(error)?;
        Ok(Err(error))
    }
}

/// Decode a response into `T` or the [`ApiError`] it carries.
///
/// Malformed responses are folded into an error with
/// [`ApiError::MALFORMED_RESPONSE`].
pub fn resolve<T: FromApiResponse>(response: &Value) -> Result<T, ApiError> {
    match try_resolve(response) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::warn!("Malformed response: {}", err);
            Err(ApiError::malformed(&err))
        }
    }
}

/// Decode the `result` object of a successful response
pub fn decode_result<W: DeserializeOwned>(response: &Value) -> Result<W, ProtocolError> {
    let result = response
        .get("result")
        .ok_or(ProtocolError::MissingField("result"))?;
    Ok(W::deserialize(result)?)
}

/// Decode `result.addOnCommandResponse` of a successful add-on response
pub fn decode_add_on_result<W: DeserializeOwned>(response: &Value) -> Result<W, ProtocolError> {
    let inner = response
        .get("result")
        .ok_or(ProtocolError::MissingField("result"))?
        .get("addOnCommandResponse")
        .ok_or(ProtocolError::MissingField("addOnCommandResponse"))?;
    Ok(W::deserialize(inner)?)
}
