//! Image intake and read-back.
//!
//! - POST /upload           multipart `image` -> `{success, imageUrl}`
//! - GET  /uploads/{name}   raw bytes, 404 when absent

use super::{
    FILE_NOT_FOUND, IMAGE_REQUIRED, IMAGE_TOO_LARGE, INVALID_FORM, UNSUPPORTED_IMAGE,
    UPLOAD_FAILED, multipart_error,
};
use crate::{
    errors::AppError,
    response::{Envelope, UploadPayload, success_with},
    services::media_service::{MediaError, content_type_for},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::ReaderStream;

/// `POST /upload`
///
/// Stores the first `image` file part. Other parts are ignored.
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<UploadPayload>>, AppError> {
    let mut multipart = multipart.map_err(|_| AppError::validation(INVALID_FORM))?;
    let base_url = request_base_url(&headers, state.public_base_url.as_deref());

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let Some(file_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_string)
        else {
            continue;
        };

        let stored = state
            .media
            .accept(&file_name, &base_url, field.map_err(io::Error::other))
            .await
            .map_err(media_error)?;

        return Ok(success_with(
            None,
            UploadPayload {
                image_url: stored.url,
            },
        ));
    }

    Err(AppError::validation(IMAGE_REQUIRED))
}

/// `GET /uploads/{name}`
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let (file, len) = state
        .media
        .open(&name)
        .await
        .map_err(|err| media_error(err).pinned())?;

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&name).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        body,
    )
        .into_response())
}

/// Origin that upload URLs are built on: the configured public URL, or the
/// scheme and host the request came in on.
pub(crate) fn request_base_url(headers: &HeaderMap, configured: Option<&str>) -> String {
    if let Some(base) = configured.filter(|b| !b.is_empty()) {
        return base.trim_end_matches('/').to_string();
    }
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

pub(crate) fn media_error(err: MediaError) -> AppError {
    match err {
        MediaError::TooLarge { .. } => AppError::too_large(IMAGE_TOO_LARGE),
        MediaError::UnsupportedType(_) => AppError::unsupported_media(UNSUPPORTED_IMAGE),
        MediaError::NotFound(_) => AppError::not_found(FILE_NOT_FOUND),
        MediaError::Io(io_err) => {
            // Multipart stream faults arrive wrapped in io::Error.
            match io_err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<MultipartError>())
            {
                Some(mp) if mp.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    AppError::too_large(IMAGE_TOO_LARGE)
                }
                Some(_) => AppError::validation(INVALID_FORM),
                None => AppError::failure(UPLOAD_FAILED, io_err),
            }
        }
    }
}
