//! JSON status replies.
//!
//! Every exit path of the relay (including caught panics) answers with
//! `{"message": "<text>"}` and `content-type: application/json`.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

pub const SENT: &str = "Message sent successfully";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub message: String,
}

/// Write `status` with a `{"message": ...}` body.
pub fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(StatusReply {
            message: message.into(),
        }),
    )
        .into_response()
}

/// Turn a handler panic into a 500 carrying the panic text.
pub fn panic_reply(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "request handler panicked".to_string()
    };
    error!(panic = %detail, "relay handler panicked");
    reply(StatusCode::INTERNAL_SERVER_ERROR, detail)
}
