use super::{
    DB_ERROR, DELETE_FAILED, INSERT_FAILED, INVALID_FORM, PET_ADDED, PET_DELETED, PET_NAME_REQUIRED,
    media_handlers::{media_error, request_base_url},
    multipart_error, parse_id,
};
use crate::{
    errors::AppError,
    models::pet::NewPet,
    response::{Envelope, PetsPayload, success, success_with},
    services::{ServiceError, is_blank, media_service::StoredMedia},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::HeaderMap,
};
use futures::TryStreamExt;
use std::io;
use tracing::{info, warn};

/// `GET /pets`
pub async fn list_pets(
    State(state): State<AppState>,
) -> Result<Json<Envelope<PetsPayload>>, AppError> {
    let pets = state
        .pets
        .list()
        .await
        .map_err(|err| AppError::failure(DB_ERROR, err))?;
    Ok(success_with(None, PetsPayload { pets }))
}

/// `POST /add-pet`
///
/// Multipart fields `pet_name`, `pet_desc` and an optional `pet_image` file.
/// The image is stored first; if the listing is then rejected or the insert
/// fails, the stored file is removed again.
pub async fn add_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope>, AppError> {
    let mut multipart = multipart.map_err(|_| AppError::validation(INVALID_FORM))?;
    let base_url = request_base_url(&headers, state.public_base_url.as_deref());
    let mut pet = NewPet::default();
    let mut stored: Option<StoredMedia> = None;

    let outcome = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("pet_name") => pet.name = field.text().await.map_err(multipart_error)?,
                Some("pet_desc") => {
                    pet.description = Some(field.text().await.map_err(multipart_error)?)
                }
                Some("pet_image") if stored.is_none() => {
                    // Browsers send an empty file part when nothing was picked.
                    let Some(file_name) =
                        field.file_name().filter(|n| !n.is_empty()).map(str::to_string)
                    else {
                        continue;
                    };
                    let media = state
                        .media
                        .accept(&file_name, &base_url, field.map_err(io::Error::other))
                        .await
                        .map_err(media_error)?;
                    stored = Some(media);
                }
                _ => {}
            }
        }

        if is_blank(&pet.name) {
            return Err(AppError::validation(PET_NAME_REQUIRED));
        }
        pet.image_url = stored.as_ref().map(|m| m.url.clone());

        state.pets.create(&pet).await.map_err(|err| match err {
            ServiceError::Validation(_) => AppError::validation(PET_NAME_REQUIRED),
            other => AppError::failure(INSERT_FAILED, other),
        })?;
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(err) = outcome {
        if let Some(media) = &stored {
            if let Err(cleanup) = state.media.remove(&media.name).await {
                warn!(name = %media.name, error = %cleanup, "could not remove orphaned upload");
            }
        }
        return Err(err);
    }

    Ok(success(PET_ADDED))
}

/// `DELETE /pets/{id}`
///
/// Idempotent. The listing's image file stays on disk.
pub async fn delete_pet(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    let id = parse_id(&raw_id)?;
    let affected = state
        .pets
        .delete(id)
        .await
        .map_err(|err| AppError::failure(DELETE_FAILED, err))?;
    info!(pet_id = id, affected, "delete pet");
    Ok(success(PET_DELETED))
}
