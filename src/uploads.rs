use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::AppError;
use crate::models::FilePayload;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 16;

/// Attachment store: decoded files written under one directory.
#[derive(Debug, Clone)]
pub struct Uploads {
    dir: PathBuf,
    max_bytes: usize,
}

impl Uploads {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decodes and writes the attachment, returning the stored file name.
    pub async fn save(&self, file: &FilePayload) -> Result<String, AppError> {
        let encoded_len = file.data.len().saturating_sub(file.data.find(',').map_or(0, |i| i + 1));
        if encoded_len / 4 * 3 > self.max_bytes + 2 {
            return Err(AppError::UploadTooLarge(format!(
                "{} exceeds {} bytes before decoding",
                file.name, self.max_bytes
            )));
        }

        let bytes = decode_data_url(&file.data)?;
        if bytes.len() > self.max_bytes {
            return Err(AppError::UploadTooLarge(format!(
                "{} is {} bytes, limit is {}",
                file.name,
                bytes.len(),
                self.max_bytes
            )));
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to create uploads dir: {e}")))?;

        let ext = extension_of(&file.name);
        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let filename = format!("{stamp}.{ext}");
            let path = self.dir.join(&filename);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut out) => {
                    out.write_all(&bytes)
                        .await
                        .map_err(|e| AppError::InternalError(format!("Error saving file: {e}")))?;
                    out.flush()
                        .await
                        .map_err(|e| AppError::InternalError(format!("Error saving file: {e}")))?;
                    info!("File saved: {}", path.display());
                    return Ok(filename);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => {
                    return Err(AppError::InternalError(format!("Error saving file: {e}")));
                }
            }
        }
    }
}

/// Extension after the last dot, restricted to ASCII alphanumerics.
pub fn extension_of(name: &str) -> String {
    let raw = name.rsplit('.').next().unwrap_or_default();
    let ext: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        FALLBACK_EXTENSION.to_string()
    } else {
        ext
    }
}

/// Decodes the base64 part of a data URL (`data:<mime>;base64,<payload>`).
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, AppError> {
    let payload = match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    };

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidUpload(format!("Bad base64 payload: {e}")))
}
