//! Error taxonomy shared by the storage server and the proxy.
//!
//! Every variant maps to exactly one HTTP status. Storage failures are logged
//! in full but reach the client only as a generic 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("forbidden: a valid API key is required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("tenant '{0}' already exists")]
    AlreadyExists(String),

    #[error("index {index} is out of range for a collection of {len} documents")]
    OutOfRange { index: usize, len: usize },

    #[error("operation '{0}' is not supported")]
    OperationUnsupported(String),

    #[error("invalid tenant name '{0}'")]
    InvalidName(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend responded with status {status}")]
    BackendError { status: u16, body: String },

    #[error("no healthy target for route '{0}'")]
    NoHealthyTarget(String),

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("storage failure: {0}")]
    InternalStorage(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::OutOfRange { .. }
            | Error::OperationUnsupported(_)
            | Error::InvalidName(_)
            | Error::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Error::BackendUnavailable(_) | Error::BackendError { .. } | Error::BadGateway(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::NoHealthyTarget(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InternalStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::InternalStorage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InternalStorage(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Error::InternalStorage(detail) => {
                tracing::error!("Storage failure: {}", detail);
                json!({ "error": "internal storage error" })
            }
            Error::BackendError { status, body } => json!({
                "error": self.to_string(),
                "backendStatus": status,
                "backendBody": body,
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
