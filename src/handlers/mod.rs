//! HTTP handlers. Each one validates its input, calls exactly one store
//! operation, and wraps the outcome in the envelope.

pub mod auth_handlers;
pub mod health_handlers;
pub mod media_handlers;
pub mod pet_handlers;
pub mod user_handlers;

use crate::errors::AppError;
use axum::{extract::multipart::MultipartError, http::StatusCode};

// Client-facing messages. The existing UI matches on some of these.
pub const ALL_FIELDS_REQUIRED: &str = "All fields required";
pub const EMAIL_EXISTS: &str = "Email already exists";
pub const SIGNUP_OK: &str = "Signup successful";
pub const USER_NOT_FOUND: &str = "User not found";
pub const INVALID_PASSWORD: &str = "Invalid password";
pub const LOGIN_OK: &str = "Login successful";
pub const DB_ERROR: &str = "DB error";
pub const INSERT_FAILED: &str = "Insert failed";
pub const DELETE_FAILED: &str = "Delete failed";
pub const INVALID_ID: &str = "Invalid id";
pub const INVALID_FORM: &str = "Invalid form data";
pub const PET_NAME_REQUIRED: &str = "Pet name required";
pub const PET_ADDED: &str = "Pet added successfully";
pub const PET_DELETED: &str = "Pet deleted successfully";
pub const USER_DELETED: &str = "User deleted successfully";
pub const IMAGE_REQUIRED: &str = "Image required";
pub const IMAGE_TOO_LARGE: &str = "Image too large";
pub const UNSUPPORTED_IMAGE: &str = "Unsupported image type";
pub const UPLOAD_FAILED: &str = "Upload failed";
pub const FILE_NOT_FOUND: &str = "File not found";
pub const DB_CONNECTED: &str = "Database connected successfully";
pub const DB_UNREACHABLE: &str = "Database connection failed";

/// Path ids are integers; anything else names no record.
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation(INVALID_ID))
}

/// Body-limit overruns surface as 413, everything else as bad form data.
pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::too_large(IMAGE_TOO_LARGE)
    } else {
        AppError::validation(INVALID_FORM)
    }
}
