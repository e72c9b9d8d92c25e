//! src/services/media_service.rs
//!
//! MediaService: durable storage for uploaded images in one flat directory
//! that is served read-only under `/uploads/`. Payloads stream to a temp file,
//! get fsynced, and are renamed into place under a generated name.

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// URL path prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MAX_EXTENSION_LEN: usize = 10;
const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("file type `{0}` is not accepted")]
    UnsupportedType(String),
    #[error("media `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// A persisted upload.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub name: String,
    pub url: String,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct MediaService {
    /// Directory holding every uploaded file.
    pub base_path: PathBuf,
    max_bytes: u64,
    allowed_extensions: Arc<[String]>,
}

impl MediaService {
    pub fn new(base_path: impl Into<PathBuf>, max_bytes: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            base_path: base_path.into(),
            max_bytes,
            allowed_extensions: allowed_extensions.into(),
        }
    }

    /// Persist one upload and return its public address under `base_url`.
    ///
    /// - Rejects extensions outside the allow-list before writing anything.
    /// - Counts bytes while streaming and aborts past `max_bytes`.
    /// - Removes the temp file on every failure path.
    pub async fn accept<S>(&self, original_name: &str, base_url: &str, stream: S) -> MediaResult<StoredMedia>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let extension = extension_of(original_name);
        self.ensure_type_allowed(extension.as_deref())?;

        let name = generate_name(extension.as_deref());
        fs::create_dir_all(&self.base_path).await?;
        let file_path = self.base_path.join(&name);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(MediaError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_bytes {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }

        info!(name = %name, size_bytes, "stored upload");
        Ok(StoredMedia {
            url: format!("{}{}/{}", base_url.trim_end_matches('/'), PUBLIC_PREFIX, name),
            name,
            size_bytes,
        })
    }

    /// Delete a stored object. Missing files are already gone.
    pub async fn remove(&self, name: &str) -> MediaResult<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed media file {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("media file {} already missing", path.display());
            }
            Err(err) => return Err(MediaError::Io(err)),
        }
        Ok(())
    }

    /// Open a stored object for streaming out, with its length.
    pub async fn open(&self, name: &str) -> MediaResult<(File, u64)> {
        let path = self.resolve(name)?;
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                MediaError::NotFound(name.to_string())
            } else {
                MediaError::Io(err)
            }
        })?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(MediaError::NotFound(name.to_string()));
        }
        Ok((file, metadata.len()))
    }

    /// Map a public name to a path inside `base_path`.
    ///
    /// Only flat names are valid: no separators, no `..`, no control bytes, no
    /// leading dot (temp files).
    fn resolve(&self, name: &str) -> MediaResult<PathBuf> {
        let valid = !name.is_empty()
            && name.len() <= MAX_NAME_LEN
            && !name.starts_with('.')
            && !name.contains("..")
            && !name
                .bytes()
                .any(|b| b == b'/' || b == b'\\' || b == b'\0' || b.is_ascii_control());
        if !valid {
            return Err(MediaError::NotFound(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }

    fn ensure_type_allowed(&self, extension: Option<&str>) -> MediaResult<()> {
        if self.allowed_extensions.is_empty() {
            return Ok(());
        }
        match extension {
            Some(ext) if self.allowed_extensions.iter().any(|allowed| allowed == ext) => Ok(()),
            Some(ext) => Err(MediaError::UnsupportedType(ext.to_string())),
            None => Err(MediaError::UnsupportedType(String::new())),
        }
    }
}

/// Lowercased extension of `original_name`, kept only when it is a short run
/// of ASCII alphanumerics.
fn extension_of(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// `<unix-millis>-<uuid>` plus the extension. The UUID keeps concurrent uploads
/// within one millisecond apart.
fn generate_name(extension: Option<&str>) -> String {
    let stem = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple());
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Content type for serving a stored object, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
