//! Defines every HTTP route of the service.
//!
//! ## Structure
//! - **Accounts**
//!   - `POST   /signup`, `POST /login`
//!   - `GET    /users`, `DELETE /users/{id}`
//!
//! - **Pet listings**
//!   - `GET    /pets`, `POST /add-pet`, `DELETE /pets/{id}`
//!
//! - **Media**
//!   - `POST   /upload`: store one image, answer with its URL
//!   - `GET    /uploads/{name}`: read a stored image back
//!
//! - **Health**
//!   - `GET    /db-check`, `GET /healthz`, `GET /readyz`

use crate::{
    config::StatusMode,
    errors::apply_status_policy,
    handlers::{
        auth_handlers::{login, signup},
        health_handlers::{db_check, healthz, readyz},
        media_handlers::{serve_upload, upload_image},
        pet_handlers::{add_pet, delete_pet, list_pets},
        user_handlers::{delete_user, list_users},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Room for multipart boundaries and the text fields next to the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full application router.
///
/// Bodies are capped at the upload limit plus multipart overhead; the upload
/// limit itself is enforced while streaming to disk.
pub fn app(state: AppState, mode: StatusMode, max_upload_bytes: u64) -> Router {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    routes()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(mode, apply_status_policy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn routes() -> Router<AppState> {
    Router::new()
        // health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/db-check", get(db_check))
        // accounts
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        // pet listings
        .route("/pets", get(list_pets))
        .route("/add-pet", post(add_pet))
        .route("/pets/{id}", delete(delete_pet))
        // media
        .route("/upload", post(upload_image))
        .route("/uploads/{name}", get(serve_upload))
}
