//! Local file storage for item and proof photos.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Default maximum upload size (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Image extensions accepted by default.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Errors from the storage service.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The file extension is missing or not allowed.
    #[error("File type not allowed: {0}")]
    UnsupportedType(String),

    /// The upload exceeds the size limit.
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// The upload has no content.
    #[error("File is empty")]
    Empty,

    /// The filename is not a bare stored name.
    #[error("Invalid filename: {0}")]
    InvalidName(String),

    /// No stored file with that name.
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded files.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: usize,
    pub content_type: String,
}

/// Saves and deletes uploaded files under a single directory.
#[derive(Debug, Clone)]
pub struct StorageService {
    config: StorageConfig,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Creates the upload directory if needed.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        info!(dir = %self.config.upload_dir.display(), "Upload directory ready");
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    /// Validates and writes a file under a freshly generated name.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let ext = self.allowed_extension(original_name)?;

        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(StorageError::TooLarge {
                size: bytes.len(),
                max: self.config.max_upload_bytes,
            });
        }

        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.config.upload_dir.join(&filename), bytes).await?;
        debug!(%filename, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            content_type: content_type_for(&ext).to_string(),
            filename,
            size: bytes.len(),
        })
    }

    /// Deletes a stored file.
    pub async fn delete(&self, filename: &str) -> Result<(), StorageError> {
        let path = self.path_of(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%filename, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns true if a stored file with this name exists.
    pub async fn exists(&self, filename: &str) -> bool {
        match self.path_of(filename) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Resolves a stored filename, rejecting anything that is not a bare name.
    fn path_of(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains("..")
            && filename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
        if !valid {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        Ok(self.config.upload_dir.join(filename))
    }

    fn allowed_extension(&self, original_name: &str) -> Result<String, StorageError> {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| StorageError::UnsupportedType(original_name.to_string()))?;

        if self.config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
            Ok(ext)
        } else {
            Err(StorageError::UnsupportedType(ext))
        }
    }
}

/// Maps a stored extension to its MIME type.
pub fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
