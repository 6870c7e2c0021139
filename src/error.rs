use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{gate::RouteClass, models::ApiMessage};

/// BackendError
///
/// Failure of a call to the external backend REST API. The client never retries; the
/// error travels up to the page handler, which turns it into a user-visible message.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The request never produced an HTTP response (connection refused, DNS, timeout).
    #[error("The store is unreachable right now. Please try again later.")]
    Unreachable(String),
    /// The backend answered with a non-2xx status or `success: false`.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    /// The backend answered 2xx but the body did not match the contract.
    #[error("Unexpected response from the store: {0}")]
    InvalidResponse(String),
    /// The outgoing form could not be assembled (bad payload or image content type).
    #[error("The form could not be sent: {0}")]
    Encode(String),
}

/// PageError
///
/// Everything a page or form handler can fail with. Rendered as `{ success: false, message }`
/// so the caller can show the message next to the form.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Something went wrong. Please try again.")]
    Internal(String),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::Validation(_) => StatusCode::BAD_REQUEST,
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::Forbidden => StatusCode::FORBIDDEN,
            // Client errors from the backend (bad credentials, duplicate email) are passed
            // through; anything else is the upstream's fault.
            PageError::Backend(BackendError::Rejected { status, .. }) if status.is_client_error() => {
                *status
            }
            PageError::Backend(BackendError::Encode(_)) => StatusCode::BAD_REQUEST,
            PageError::Backend(_) => StatusCode::BAD_GATEWAY,
            PageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            PageError::Internal(detail) => tracing::error!(%detail, "page handler failed"),
            PageError::Backend(e) if status.is_server_error() => {
                tracing::error!(error = ?e, "backend call failed")
            }
            _ => tracing::debug!(%status, message = %self, "page request rejected"),
        }

        let body = ApiMessage {
            success: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// ConfigError
///
/// Startup misconfiguration detected while validating `AppConfig`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} landing `{path}` is classified as {class:?}; redirecting there would be rejected again")]
    LandingLoop {
        name: &'static str,
        path: String,
        class: RouteClass,
    },
    #[error("{name} landing `{path}` must be an absolute path starting with `/`")]
    RelativeLanding { name: &'static str, path: String },
}
