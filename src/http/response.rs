//! Response shaping and the error boundary.
//!
//! # Responsibilities
//! - Map domain errors to HTTP status codes with a JSON error body
//! - Convert unhandled pipeline errors and panics into a generic 500
//!
//! # Design Decisions
//! - Internal failure detail is logged, never sent to the client
//! - Every unhandled failure produces the same body

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tower::timeout::error::Elapsed;
use tower::BoxError;

/// Message returned for every unhandled failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Errors a handler maps to a client-visible response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Detail stays in the logs; the client sees the generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            e @ ApiError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Unhandled error escaping the handler stack.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request timed out")]
    Timeout,

    #[error("unhandled service error: {0}")]
    Internal(BoxError),
}

impl From<BoxError> for PipelineError {
    fn from(err: BoxError) -> Self {
        if err.is::<Elapsed>() {
            PipelineError::Timeout
        } else {
            PipelineError::Internal(err)
        }
    }
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: INTERNAL_ERROR_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

/// Outer boundary for errors re-raised by the request logging layer.
pub async fn handle_pipeline_error(err: PipelineError) -> Response {
    tracing::debug!(error = %err, "Converted unhandled error into 500 response");
    internal_error_response()
}

/// Outer boundary for panics re-raised by the request logging layer.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::debug!(panic = panic_message(payload.as_ref()), "Converted panic into 500 response");
    internal_error_response()
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
