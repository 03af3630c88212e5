use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{0}")]
    Malformed(String),
    #[error("Could not write image: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Malformed payloads become a validation error on `field`.
    pub fn into_api(self, field: &str) -> ApiError {
        match self {
            ImageError::Malformed(message) => ApiError::validation(field, message),
            ImageError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Persists decoded image payloads and hands back their public url.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, data_uri: &str, folder: &str) -> Result<String, ImageError>;
    /// Missing files are not an error.
    async fn remove(&self, url: &str) -> Result<(), ImageError>;
}

/// Splits `data:image/<ext>;base64,<payload>` into an extension and bytes.
pub fn decode_data_uri(data_uri: &str) -> Result<(String, Vec<u8>), ImageError> {
    let malformed = || ImageError::Malformed(String::from("Upload a valid base64 encoded image."));

    let rest = data_uri.trim().strip_prefix("data:image/").ok_or_else(malformed)?;
    let (format, payload) = rest.split_once(";base64,").ok_or_else(malformed)?;

    let extension = match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        _ => {
            return Err(ImageError::Malformed(format!(
                "Unsupported image format: {format}"
            )))
        }
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| malformed())?;
    if bytes.is_empty() {
        return Err(malformed());
    }

    Ok((extension.to_string(), bytes))
}

/// Files under `root`, served at `{public_url}/media/`.
#[derive(Debug, Clone)]
pub struct MediaDir {
    root: PathBuf,
    base_url: String,
}

impl MediaDir {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: format!("{}/media/", public_url.trim_end_matches('/')),
        }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.base_url)?;
        if relative.split('/').any(|part| part == ".." || part.is_empty()) {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for MediaDir {
    async fn store(&self, data_uri: &str, folder: &str) -> Result<String, ImageError> {
        let (extension, bytes) = decode_data_uri(data_uri)?;
        let name = format!("{}.{extension}", Uuid::new_v4());

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), bytes).await?;

        log::debug!("> Stored image {folder}/{name}");
        Ok(format!("{}{folder}/{name}", self.base_url))
    }

    async fn remove(&self, url: &str) -> Result<(), ImageError> {
        let Some(path) = self.local_path(url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 1x1 png
#[cfg(test)]
pub(crate) const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
