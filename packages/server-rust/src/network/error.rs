//! Writes [`AppError`] values as JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scaffold_core::AppError;
use tracing::{debug, error};

/// A handler failure on its way to the client.
///
/// This is the only failure type handlers return. It is consumed when the
/// response is written, so an error is rendered at most once per request.
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    expose_detail: bool,
}

impl ApiError {
    /// `expose_detail` controls whether internal diagnostics reach the body.
    #[must_use]
    pub fn new(error: AppError, expose_detail: bool) -> Self {
        Self {
            error,
            expose_detail,
        }
    }

    #[must_use]
    pub fn error(&self) -> &AppError {
        &self.error
    }
}

/// Errors converted without server context never expose detail.
impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self::new(error, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = &self.error;
        if err.status() >= 500 {
            error!(
                code = %err.code(),
                status = err.status(),
                message = err.message(),
                detail = err.detail().unwrap_or(""),
                "request failed"
            );
        } else {
            debug!(
                code = %err.code(),
                status = err.status(),
                message = err.message(),
                "request rejected"
            );
        }
        error_response(err, self.expose_detail)
    }
}

/// JSON body plus status for `err`. Statuses outside the valid HTTP range
/// fall back to 500.
pub(crate) fn error_response(err: &AppError, expose_detail: bool) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_body(expose_detail))).into_response()
}
