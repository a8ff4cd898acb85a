use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use rocket::http::ContentType;
use tokio::fs;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 8] = ["mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v"];

/// Lower-cased extension of `filename` when it is an accepted video type.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();

    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

pub fn content_type_for(filename: &str) -> ContentType {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let subtype = match extension.as_str() {
        "mov" => "quicktime",
        "avi" => "x-msvideo",
        "mkv" => "x-matroska",
        "wmv" => "x-ms-wmv",
        "flv" => "x-flv",
        "m4v" => "x-m4v",
        "" => return ContentType::Binary,
        _ => return ContentType::new("video", extension),
    };

    ContentType::new("video", subtype)
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: i64,
}

/// Video blobs on local disk, named `user_{id}_{uuid}.{ext}` under one directory.
pub struct VideoStorage {
    root: PathBuf,
}

impl VideoStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn generate_filename(user_id: i64, extension: &str) -> String {
        format!("user_{}_{}.{}", user_id, Uuid::new_v4(), extension)
    }

    #[instrument(skip(self, file))]
    pub async fn save(
        &self,
        file: &mut TempFile<'_>,
        user_id: i64,
        extension: &str,
    ) -> Result<StoredFile, AppError> {
        fs::create_dir_all(&self.root).await?;

        let filename = Self::generate_filename(user_id, extension);
        let path = self.root.join(&filename);

        file.copy_to(&path).await?;
        let size = fs::metadata(&path).await?.len() as i64;

        info!(filename = %filename, size, "Stored uploaded video");
        Ok(StoredFile {
            filename,
            path,
            size,
        })
    }

    /// Deletes a stored blob. Failures are logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn remove(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => info!("Removed video file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("Video file already missing")
            }
            Err(err) => warn!(error = %err, "Failed to remove video file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        assert_eq!(allowed_extension("kata.MP4").as_deref(), Some("mp4"));
        assert_eq!(allowed_extension("spar.round2.webm").as_deref(), Some("webm"));
        assert_eq!(allowed_extension("notes.txt"), None);
        assert_eq!(allowed_extension("no_extension"), None);
    }

    #[test]
    fn maps_content_types() {
        assert_eq!(content_type_for("a.mp4"), ContentType::new("video", "mp4"));
        assert_eq!(content_type_for("a.mov"), ContentType::new("video", "quicktime"));
        assert_eq!(content_type_for("a.MKV"), ContentType::new("video", "x-matroska"));
    }

    #[test]
    fn generated_names_are_unique_and_owned() {
        let first = VideoStorage::generate_filename(7, "mp4");
        let second = VideoStorage::generate_filename(7, "mp4");
        assert!(first.starts_with("user_7_"));
        assert!(first.ends_with(".mp4"));
        assert_ne!(first, second);
    }

    #[rocket::async_test]
    async fn remove_tolerates_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = VideoStorage::new(dir.path());
        let path = dir.path().join(VideoStorage::generate_filename(3, "mp4"));

        fs::write(&path, b"frames").await.unwrap();
        storage.remove(&path).await;
        assert!(!path.exists());

        storage.remove(&path).await;
    }
}
