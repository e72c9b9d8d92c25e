//! Signup and login.
//!
//! - POST /signup `{user_name, user_email, user_pass}`
//! - POST /login  `{user_email, user_pass}`

use super::{
    ALL_FIELDS_REQUIRED, DB_ERROR, EMAIL_EXISTS, INSERT_FAILED, INVALID_PASSWORD, LOGIN_OK,
    SIGNUP_OK, USER_NOT_FOUND,
};
use crate::{
    errors::AppError,
    response::{Envelope, LoginPayload, success, success_with},
    services::ServiceError,
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub user_name: String,
    pub user_email: String,
    pub user_pass: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub user_email: String,
    pub user_pass: String,
}

/// `POST /signup`
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<Envelope>, AppError> {
    let Json(req) = payload.map_err(|_| AppError::validation(ALL_FIELDS_REQUIRED))?;

    state
        .users
        .register(&req.user_name, &req.user_email, &req.user_pass)
        .await
        .map_err(|err| match err {
            ServiceError::Validation(_) => AppError::validation(ALL_FIELDS_REQUIRED),
            ServiceError::Conflict(_) => AppError::conflict(EMAIL_EXISTS),
            other => AppError::failure(INSERT_FAILED, other),
        })?;

    Ok(success(SIGNUP_OK))
}

/// `POST /login`
///
/// Unknown email and wrong password answer with different messages, as the
/// existing client expects.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Envelope<LoginPayload>>, AppError> {
    let Json(req) = payload.map_err(|_| AppError::validation(ALL_FIELDS_REQUIRED))?;

    let user = state
        .users
        .authenticate(&req.user_email, &req.user_pass)
        .await
        .map_err(|err| match err {
            ServiceError::Validation(_) => AppError::validation(ALL_FIELDS_REQUIRED),
            ServiceError::NotFound(_) => AppError::not_found(USER_NOT_FOUND),
            ServiceError::InvalidCredential => AppError::unauthorized(INVALID_PASSWORD),
            other => AppError::failure(DB_ERROR, other),
        })?;

    Ok(success_with(Some(LOGIN_OK), LoginPayload { user }))
}

#[cfg(test)]
mod tests {
    use crate::{config::StatusMode, test_support::test_app};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn alice_signup_and_login_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), StatusMode::Compat).await;

        let (status, body) = post_json(
            &app,
            "/signup",
            json!({"user_name": "alice", "user_email": "a@x.com", "user_pass": "pw123"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "message": "Signup successful"}));

        let (status, body) = post_json(
            &app,
            "/signup",
            json!({"user_name": "alice2", "user_email": "a@x.com", "user_pass": "other"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": false, "message": "Email already exists"}));

        let (_, body) = post_json(
            &app,
            "/login",
            json!({"user_email": "a@x.com", "user_pass": "pw123"}),
        )
        .await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Login successful"));
        assert_eq!(body["user"]["name"], json!("alice"));
        assert_eq!(body["user"]["role"], json!("user"));
        assert!(body["user"]["id"].is_i64());
        assert_eq!(body["user"].as_object().unwrap().len(), 3);

        let (_, body) = post_json(
            &app,
            "/login",
            json!({"user_email": "a@x.com", "user_pass": "wrong"}),
        )
        .await;
        assert_eq!(body, json!({"success": false, "message": "Invalid password"}));
        assert!(!body.to_string().contains("$2"));
    }

    #[tokio::test]
    async fn missing_fields_and_bad_bodies_stay_inside_the_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), StatusMode::Compat).await;

        let (status, body) =
            post_json(&app, "/signup", json!({"user_name": "x", "user_email": "x@x.com"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": false, "message": "All fields required"}));

        let response = app
            .clone()
            .oneshot(Request::post("/login").body(Body::from("not json")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"success": false, "message": "All fields required"}));

        let (_, body) = post_json(
            &app,
            "/login",
            json!({"user_email": "ghost@x.com", "user_pass": "pw"}),
        )
        .await;
        assert_eq!(body, json!({"success": false, "message": "User not found"}));
    }

    #[tokio::test]
    async fn rest_mode_maps_failures_to_http_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path(), StatusMode::Rest).await;

        let signup = json!({"user_name": "bob", "user_email": "b@x.com", "user_pass": "pw"});
        assert_eq!(post_json(&app, "/signup", signup.clone()).await.0, StatusCode::OK);
        assert_eq!(post_json(&app, "/signup", signup).await.0, StatusCode::CONFLICT);

        let (status, body) = post_json(
            &app,
            "/login",
            json!({"user_email": "b@x.com", "user_pass": "nope"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));

        let (status, _) = post_json(&app, "/login", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
