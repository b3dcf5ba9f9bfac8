use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_core::CourierError;

use crate::http::reply::reply;

/// Every way a relay request can end short of success.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Discord client is not ready")]
    NotReady,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid request format")]
    InvalidFormat,

    #[error("Unsupported target: '{0}'")]
    UnsupportedTarget(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Either message or embed is required")]
    MissingContent,

    /// Lookup or send failed; the text is passed through to the caller.
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::InvalidFormat
            | RelayError::UnsupportedTarget(_)
            | RelayError::MissingContent => StatusCode::BAD_REQUEST,
            RelayError::UserNotFound => StatusCode::NOT_FOUND,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CourierError> for RelayError {
    fn from(e: CourierError) -> Self {
        RelayError::Internal(e.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        reply(self.status(), self.to_string())
    }
}
