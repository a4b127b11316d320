//! # Local media storage
//!
//! Stores listing images on the local filesystem and serves them through the
//! web layer's static file mount.
//!
//! Layout under `root`:
//! ```text
//! upload/<id>.<ext>          original
//! upload/w_250/<id>.<ext>    thumbnail, matches ImageRef::thumbnail_url
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domains::{DomainError, DomainResult, ImageRef, MediaStorage, Upload, THUMBNAIL_WIDTH};
use image::{ImageFormat, ImageReader};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const NOT_AN_IMAGE: &str = "Uploaded file is not a supported image";

pub struct LocalMediaStorage {
    /// Root directory for all uploads (e.g. "./data/uploads")
    root: PathBuf,
    /// Public URL prefix the root is mounted at (e.g. "/media")
    url_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    fn original_path(&self, file: &str) -> PathBuf {
        self.root.join("upload").join(file)
    }

    fn thumbnail_path(&self, file: &str) -> PathBuf {
        self.root
            .join("upload")
            .join(format!("w_{THUMBNAIL_WIDTH}"))
            .join(file)
    }
}

fn io_error(context: &str, err: std::io::Error) -> DomainError {
    DomainError::Media(format!("{context}: {err}"))
}

/// Sniffs the format from the bytes; the declared content type is not trusted.
fn detect_format(bytes: &[u8]) -> DomainResult<ImageFormat> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.format())
        .ok_or_else(|| DomainError::validation(NOT_AN_IMAGE))
}

/// Decodes, shrinks to the thumbnail width and writes the result. Images
/// already narrower than the thumbnail are written unchanged.
fn write_thumbnail(bytes: &[u8], format: ImageFormat, target: &Path) -> DomainResult<()> {
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| DomainError::validation(NOT_AN_IMAGE))?;
    let thumb = if img.width() > THUMBNAIL_WIDTH {
        img.thumbnail(THUMBNAIL_WIDTH, u32::MAX)
    } else {
        img
    };
    thumb
        .save_with_format(target, format)
        .map_err(|e| DomainError::Media(format!("thumbnail encode failed: {e}")))
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store(&self, upload: Upload) -> DomainResult<ImageRef> {
        let format = detect_format(&upload.bytes)?;
        let ext = format.extensions_str().first().copied().unwrap_or("img");
        let file = format!("{}.{ext}", Uuid::now_v7().simple());

        let original = self.original_path(&file);
        let thumbnail = self.thumbnail_path(&file);
        if let Some(dir) = thumbnail.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error("creating upload directory", e))?;
        }

        // Decode first so a corrupt upload leaves nothing behind.
        let bytes = upload.bytes.clone();
        let thumb_target = thumbnail.clone();
        tokio::task::spawn_blocking(move || write_thumbnail(&bytes, format, &thumb_target))
            .await
            .map_err(|e| DomainError::Internal(format!("thumbnail task failed: {e}")))??;

        fs::write(&original, &upload.bytes)
            .await
            .map_err(|e| io_error("writing upload", e))?;

        info!(
            file = %file,
            original_name = %upload.file_name,
            size = upload.bytes.len(),
            "image stored locally"
        );
        Ok(ImageRef {
            url: format!("{}/upload/{file}", self.url_prefix),
            filename: file,
        })
    }

    async fn delete(&self, image: &ImageRef) -> DomainResult<()> {
        let file = image.filename.as_str();
        if file.is_empty() || file.contains(['/', '\\']) || file.contains("..") {
            warn!(filename = %file, "refusing to delete suspicious media path");
            return Ok(());
        }
        for path in [self.original_path(file), self.thumbnail_path(file)] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "media file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("removing media file", e)),
            }
        }
        Ok(())
    }
}
