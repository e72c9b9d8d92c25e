//! Fixtures shared by the unit tests.

use crate::{
    config::{StatusMode, UploadConfig},
    db::{
        Engine, QueryExecutor, RowSet, SqlValue, Statement, StoreResult, migrate,
        sqlite::SqliteExecutor, with_timeout,
    },
    routes::routes::app,
    services::credential_store::CredentialStore,
    state::AppState,
};
use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use std::{future, path::Path, sync::Arc, time::Duration};

/// A fresh in-memory database with the schema applied.
pub async fn memory_db() -> Arc<dyn QueryExecutor> {
    let db = SqliteExecutor::in_memory().await.expect("open in-memory sqlite");
    migrate::run(&db).await.expect("apply schema");
    Arc::new(db)
}

pub fn upload_config(dir: &Path, max_bytes: u64) -> UploadConfig {
    UploadConfig {
        dir: dir.to_string_lossy().into_owned(),
        max_bytes,
        allowed_extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
        public_base_url: None,
    }
}

/// State over a fresh database, with fast password hashing.
pub async fn test_state(uploads: &UploadConfig) -> AppState {
    let db = memory_db().await;
    let mut state = AppState::new(db.clone(), uploads);
    state.users = CredentialStore::with_cost(db, 4);
    state
}

pub async fn test_app(upload_dir: &Path, mode: StatusMode) -> (Router, AppState) {
    let uploads = upload_config(upload_dir, 64 * 1024);
    let state = test_state(&uploads).await;
    (app(state.clone(), mode, uploads.max_bytes), state)
}

/// An engine that never answers; every call ends in `StoreError::Timeout`.
pub struct StalledExecutor;

const STALL_LIMIT: Duration = Duration::from_millis(20);

#[async_trait]
impl QueryExecutor for StalledExecutor {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn execute(&self, _template: &str, _params: &[SqlValue]) -> StoreResult<RowSet> {
        with_timeout(STALL_LIMIT, future::pending()).await
    }

    async fn execute_all(&self, _statements: &[Statement]) -> StoreResult<Vec<RowSet>> {
        with_timeout(STALL_LIMIT, future::pending()).await
    }

    async fn close(&self) {}
}

/// Router whose every query times out.
pub fn stalled_app(upload_dir: &Path, mode: StatusMode) -> Router {
    let uploads = upload_config(upload_dir, 64 * 1024);
    let state = AppState::new(Arc::new(StalledExecutor), &uploads);
    app(state, mode, uploads.max_bytes)
}

const BOUNDARY: &str = "X-PET-REGISTRY-BOUNDARY";

/// One part of a hand-built multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header("host", "pets.test:3000")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
