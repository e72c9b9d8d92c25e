//! Shared handler state.

use crate::{
    config::UploadConfig,
    db::QueryExecutor,
    services::{credential_store::CredentialStore, media_service::MediaService, pet_store::PetStore},
};
use std::sync::Arc;

/// Everything a handler can reach. The executor is created once in `main` and
/// shared by both stores.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn QueryExecutor>,
    pub users: CredentialStore,
    pub pets: PetStore,
    pub media: MediaService,
    /// Fixed origin for upload URLs; the request's own origin when unset.
    pub public_base_url: Option<String>,
}

impl AppState {
    pub fn new(db: Arc<dyn QueryExecutor>, uploads: &UploadConfig) -> Self {
        Self {
            users: CredentialStore::new(db.clone()),
            pets: PetStore::new(db.clone()),
            media: MediaService::new(
                &uploads.dir,
                uploads.max_bytes,
                uploads.allowed_extensions.clone(),
            ),
            public_base_url: uploads.public_base_url.clone(),
            db,
        }
    }
}
