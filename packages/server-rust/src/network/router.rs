//! Route table.
//!
//! Layer order, outermost first: request id assignment and propagation, the
//! caller's [`MiddlewareChain`], in-flight tracking, then routing. Unmatched
//! paths and unsupported methods both end in the JSON 404 fallback.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use scaffold_core::{AppError, ErrorCode};

use super::handlers::{
    create_user, delete_user, get_user, get_user_by_email, health_handler, list_users,
    liveness_handler, readiness_handler, route_not_found, status_handler, update_user, AppState,
};
use super::error::ApiError;
use super::middleware::{request_id_layers, MiddlewareChain};
use super::shutdown::ShutdownController;

/// Builds the application router with every route and layer installed.
pub fn build_router(state: AppState, chain: MiddlewareChain) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/users", post(create_user).get(list_users))
        .route("/api/v1/users/by-email/{email}", get(get_user_by_email))
        .route(
            "/api/v1/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.shutdown),
            track_in_flight,
        ))
        .layer(chain.into_layer())
        .layer(request_id_layers())
        .with_state(state)
}

/// Counts the request as in flight and abandons it with a 503 once the
/// server force-cancels outstanding work.
pub(crate) async fn track_in_flight(
    State(shutdown): State<Arc<ShutdownController>>,
    req: Request,
    next: Next,
) -> Response {
    let _guard = shutdown.in_flight_guard();
    let force = shutdown.request_token();
    tokio::select! {
        response = next.run(req) => response,
        () = force.cancelled() => ApiError::from(AppError::new(
            ErrorCode::Internal,
            "server is shutting down",
            503,
        ))
        .into_response(),
    }
}
