//! HTTP handlers and the state they share.
//!
//! Handlers never touch storage directly; they go through the
//! [`UserRepository`] in [`AppState`] and turn failures into [`ApiError`]
//! with [`AppState::fail`].

pub mod health;
pub mod users;

pub use health::{health_handler, liveness_handler, readiness_handler, status_handler};
pub use users::{
    create_user, delete_user, get_user, get_user_by_email, list_users, update_user,
};

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use scaffold_core::{AppError, ErrorCode, RequestContext, Validator};
use uuid::Uuid;

use super::error::ApiError;
use super::middleware::REQUEST_ID_HEADER;
use super::shutdown::ShutdownController;
use crate::config::AppConfig;
use crate::traits::UserRepository;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub validator: Arc<Validator>,
    pub shutdown: Arc<ShutdownController>,
    /// Reported by `GET /health`.
    pub service_name: Arc<str>,
    /// Deadline applied to each request's [`RequestContext`].
    pub request_timeout: Duration,
    /// Attach internal diagnostics to error bodies (non-production only).
    pub expose_error_details: bool,
}

impl AppState {
    /// State with development defaults: service name `scaffold`, a 30 second
    /// request deadline, and error details exposed.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, shutdown: Arc<ShutdownController>) -> Self {
        Self {
            users,
            validator: Arc::new(Validator::new()),
            shutdown,
            service_name: Arc::from("scaffold"),
            request_timeout: Duration::from_secs(30),
            expose_error_details: true,
        }
    }

    #[must_use]
    pub fn from_config(
        config: &AppConfig,
        users: Arc<dyn UserRepository>,
        validator: Arc<Validator>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            validator,
            service_name: Arc::from(config.observability.service_name.as_str()),
            request_timeout: config.server.request_timeout(),
            expose_error_details: !config.observability.is_production(),
            ..Self::new(users, shutdown)
        }
    }

    /// Classifies `err` and wraps it for the response writer.
    pub fn fail(&self, err: impl Into<AppError>) -> ApiError {
        ApiError::new(err.into(), self.expose_error_details)
    }
}

/// Extracts a [`RequestContext`] for the current request.
///
/// The id comes from the `x-request-id` header (a fresh UUID when absent),
/// the deadline from the configured request timeout, and the cancellation
/// token descends from the server's force-cancel token.
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

impl FromRequestParts<AppState> for Ctx {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

        Ok(Self(
            RequestContext::new(request_id)
                .with_timeout(state.request_timeout)
                .with_cancellation(state.shutdown.request_token()),
        ))
    }
}

/// Fallback for unmatched paths and for methods a path does not serve.
pub async fn route_not_found() -> ApiError {
    ApiError::from(AppError::with_code(ErrorCode::NotFound, "route not found"))
}
