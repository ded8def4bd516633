use reqwest::StatusCode;
use thiserror::Error;

use crate::state::StoreError;

/// Failure of a single backend operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Backend returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        ApiError::MalformedResponse(what.into())
    }
}
