use crate::{config::StatusMode, response::Envelope};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::error;

/// A failed request, already reduced to the message the client sees.
///
/// `status` is the REST-style status. In compat mode the status-policy
/// middleware rewrites it to 200 unless `pinned` is set.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub pinned: bool,
}

/// Marks responses produced from a business failure.
#[derive(Clone, Copy, Debug)]
struct DomainFailure;

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            pinned: false,
        }
    }

    /// Missing or malformed input.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn too_large(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, msg)
    }

    pub fn unsupported_media(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    /// An opaque store or I/O fault. The cause is logged here and replaced by
    /// `msg` in the response.
    pub fn failure(msg: impl Into<String>, cause: impl fmt::Display) -> Self {
        let msg = msg.into();
        error!(error = %cause, "{}", msg);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Keep `status` regardless of the status policy.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(Envelope::failure(self.message));
        if self.pinned {
            (self.status, body).into_response()
        } else {
            (self.status, Extension(DomainFailure), body).into_response()
        }
    }
}

/// In compat mode every business failure goes out as 200 with
/// `success: false`; in rest mode statuses pass through.
pub async fn apply_status_policy(
    State(mode): State<StatusMode>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if mode == StatusMode::Compat && response.extensions().get::<DomainFailure>().is_some() {
        *response.status_mut() = StatusCode::OK;
    }
    response
}
