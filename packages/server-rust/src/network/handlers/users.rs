//! `/api/v1/users` endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use scaffold_core::{AppError, CreateUserRequest, UpdateUserRequest, UserId, UserResponse};
use serde::Deserialize;

use super::{AppState, Ctx};
use crate::network::error::ApiError;

/// Page size when `limit` is omitted.
pub const DEFAULT_LIMIT: u32 = 20;

/// Query string of `GET /api/v1/users`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn body<T>(state: &AppState, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| {
            state.fail(AppError::validation(format!(
                "invalid request body: {}",
                rejection.body_text()
            )))
        })
}

fn user_id(state: &AppState, id: Result<Path<UserId>, PathRejection>) -> Result<UserId, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| state.fail(AppError::bad_request("user id must be an integer")))
}

/// `POST /api/v1/users` → 201.
pub async fn create_user(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let new_user = body(&state, payload)?
        .into_new_user(&state.validator)
        .map_err(|e| state.fail(e))?;
    let user = state
        .users
        .create(&ctx, &new_user)
        .await
        .map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /api/v1/users?limit=&offset=`, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        state.fail(AppError::bad_request(format!(
            "invalid pagination: {}",
            rejection.body_text()
        )))
    })?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(state.fail(AppError::bad_request("limit must be greater than 0")));
    }
    let users = state
        .users
        .list(&ctx, limit, params.offset.unwrap_or(0))
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = user_id(&state, id)?;
    let user = state
        .users
        .get_by_id(&ctx, id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(user.into()))
}

pub async fn get_user_by_email(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    email: Result<Path<String>, PathRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Path(email) =
        email.map_err(|_| state.fail(AppError::bad_request("email must be valid UTF-8")))?;
    let user = state
        .users
        .get_by_email(&ctx, email.trim())
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    id: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = user_id(&state, id)?;
    let update = body(&state, payload)?
        .into_update(id, &state.validator)
        .map_err(|e| state.fail(e))?;
    let user = state
        .users
        .update(&ctx, &update)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(user.into()))
}

/// `DELETE /api/v1/users/{id}` → 204, whether or not the user existed.
pub async fn delete_user(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = user_id(&state, id)?;
    state
        .users
        .delete(&ctx, id)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use axum::http::Method;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::network::handlers::AppState;
    use crate::network::middleware::MiddlewareChain;
    use crate::network::router::build_router;
    use crate::network::ShutdownController;
    use crate::storage::InMemoryUserRepository;

    use super::*;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(ShutdownController::new()),
        );
        build_router(state, MiddlewareChain::new())
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn create_then_fetch_by_id_and_email() {
        let app = app();
        let (status, created) = call(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(json!({"email": "ada@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["email"], "ada@example.com");
        assert_eq!(created["created_at"], created["updated_at"]);

        let id = created["id"].as_i64().unwrap();
        let (status, fetched) = call(&app, Method::GET, &format!("/api/v1/users/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, by_email) =
            call(&app, Method::GET, "/api/v1/users/by-email/ada@example.com", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_email["id"], created["id"]);
    }

    #[tokio::test]
    async fn invalid_email_is_a_validation_error() {
        let (status, body) = call(
            &app(),
            Method::POST,
            "/api/v1/users",
            Some(json!({"email": "not-an-email"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().starts_with("email: "));
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/users")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let app = app();
        let payload = json!({"email": "dup@example.com"});
        call(&app, Method::POST, "/api/v1/users", Some(payload.clone())).await;

        let (status, body) = call(&app, Method::POST, "/api/v1/users", Some(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (status, body) = call(&app(), Method::GET, "/api/v1/users/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"code": "NOT_FOUND", "message": "user not found"}));
    }

    #[tokio::test]
    async fn undecodable_email_path_is_a_json_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/users/by-email/%FF")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({"code": "BAD_REQUEST", "message": "email must be valid UTF-8"})
        );
    }

    #[tokio::test]
    async fn non_numeric_id_is_bad_request() {
        let (status, body) = call(&app(), Method::GET, "/api/v1/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn update_changes_email_and_advances_timestamp() {
        let app = app();
        let (_, created) = call(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(json!({"email": "old@example.com"})),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = call(
            &app,
            Method::PUT,
            &format!("/api/v1/users/{id}"),
            Some(json!({"email": "new@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["email"], "new@example.com");
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["created_at"], created["created_at"]);
        assert_ne!(updated["updated_at"], created["updated_at"]);
    }

    #[tokio::test]
    async fn update_of_missing_user_is_not_found() {
        let (status, _) = call(
            &app(),
            Method::PUT,
            "/api/v1/users/41",
            Some(json!({"email": "x@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let app = app();
        let (_, created) = call(
            &app,
            Method::POST,
            "/api/v1/users",
            Some(json!({"email": "gone@example.com"})),
        )
        .await;
        let uri = format!("/api/v1/users/{}", created["id"]);

        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let app = app();
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            call(&app, Method::POST, "/api/v1/users", Some(json!({"email": email}))).await;
        }

        let (status, first) = call(&app, Method::GET, "/api/v1/users?limit=2&offset=0", None).await;
        assert_eq!(status, StatusCode::OK);
        let emails: Vec<_> = first
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["email"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(emails, vec!["c@example.com", "b@example.com"]);

        let (_, second) = call(&app, Method::GET, "/api/v1/users?limit=2&offset=2", None).await;
        assert_eq!(second.as_array().unwrap().len(), 1);
        assert_eq!(second[0]["email"], "a@example.com");

        let (_, all) = call(&app, Method::GET, "/api/v1/users", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn bad_pagination_is_rejected() {
        let app = app();
        for query in ["limit=-1", "limit=abc", "offset=-5", "limit=0"] {
            let (status, body) =
                call(&app, Method::GET, &format!("/api/v1/users?{query}"), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
            assert_eq!(body["code"], "BAD_REQUEST", "{query}");
        }
    }
}
