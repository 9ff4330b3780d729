//! Health, probe, and status endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::network::HealthState;

/// `GET /health`: `{"status":"healthy","service":"<name>"}`.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": &*state.service_name,
    }))
}

/// `GET /api/v1/status`: `{"status":"running","version":"<crate version>"}`.
pub async fn status_handler() -> Json<Value> {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe. Always 200 while the process can answer at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only in the `Ready` state, so load balancers stop
/// routing here as soon as draining starts.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::network::ShutdownController;
    use crate::storage::InMemoryUserRepository;

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(ShutdownController::new()),
        )
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let mut state = test_state();
        state.service_name = Arc::from("billing");

        let Json(body) = health_handler(State(state)).await;
        assert_eq!(body, json!({"status": "healthy", "service": "billing"}));
    }

    #[tokio::test]
    async fn status_reports_crate_version() {
        let Json(body) = status_handler().await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn liveness_always_ok() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_health_state() {
        let state = test_state();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.shutdown.set_ready();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
