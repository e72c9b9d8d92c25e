use super::{DB_ERROR, DELETE_FAILED, USER_DELETED, parse_id};
use crate::{
    errors::AppError,
    response::{Envelope, UsersPayload, success, success_with},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

/// `GET /users`
///
/// Every account, newest first. Password hashes never leave the store.
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Envelope<UsersPayload>>, AppError> {
    let users = state
        .users
        .list()
        .await
        .map_err(|err| AppError::failure(DB_ERROR, err))?;
    Ok(success_with(None, UsersPayload { users }))
}

/// `DELETE /users/{id}`
///
/// Deleting an id that does not exist still succeeds.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    let id = parse_id(&raw_id)?;
    let affected = state
        .users
        .delete(id)
        .await
        .map_err(|err| AppError::failure(DELETE_FAILED, err))?;
    info!(user_id = id, affected, "delete user");
    Ok(success(USER_DELETED))
}
