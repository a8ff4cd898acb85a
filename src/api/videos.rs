use std::path::Path;

use rocket::form::Form;
use rocket::fs::{NamedFile, TempFile};
use rocket::http::{ContentType, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{StreamUser, User};
use crate::database::{self, NewVideo, VideoChanges, VideoFilter};
use crate::error::AppError;
use crate::models::TrainingVideo;
use crate::storage::{allowed_extension, content_type_for, VideoStorage, ALLOWED_EXTENSIONS};
use crate::validation::{nullable, JsonValidateExt};

use super::{page, MessageResponse};

pub const DEFAULT_VIDEO_TITLE: &str = "Untitled Training Video";

#[derive(FromForm)]
pub struct VideoUpload<'r> {
    pub video: Option<TempFile<'r>>,
    pub title: Option<String>,
    pub technique_name: Option<String>,
    pub style: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<String>,
    pub technique_id: Option<i64>,
    pub session_id: Option<i64>,
}

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct VideoUpdateRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub technique_id: Option<Option<i64>>,
    #[serde(deserialize_with = "nullable")]
    pub session_id: Option<Option<i64>>,
}

#[derive(Serialize, Debug)]
pub struct VideoResponse {
    pub video: TrainingVideo,
}

#[derive(Serialize, Debug)]
pub struct VideoMessageResponse {
    pub message: String,
    pub video: TrainingVideo,
}

#[derive(Serialize, Debug)]
pub struct VideoListResponse {
    pub videos: Vec<TrainingVideo>,
    pub count: usize,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[get("/training/videos?<technique_id>&<style>&<technique_name>&<limit>&<offset>")]
pub async fn list_videos(
    user: User,
    technique_id: Option<i64>,
    style: Option<String>,
    technique_name: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<VideoListResponse>, AppError> {
    let (limit, offset) = page(limit, offset);
    let filter = VideoFilter {
        technique_id,
        style: non_empty(style),
        technique_name: non_empty(technique_name),
        limit,
        offset,
    };

    let (videos, total) = database::list_videos(db, user.id, &filter).await?;

    Ok(Json(VideoListResponse {
        count: videos.len(),
        videos,
        total,
        limit,
        offset,
    }))
}

/// Accepts a multipart upload. The file is written before the row, and removed
/// again if the row cannot be recorded.
#[post("/training/videos", data = "<upload>")]
pub async fn upload_video(
    user: User,
    mut upload: Form<VideoUpload<'_>>,
    db: &State<Pool<Sqlite>>,
    storage: &State<VideoStorage>,
) -> Result<Custom<Json<VideoMessageResponse>>, AppError> {
    let Some(file) = upload.video.as_ref() else {
        return Err(AppError::Validation("No video file provided".to_string()));
    };

    let original_name = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_default();

    if original_name.trim().is_empty() {
        return Err(AppError::Validation("No file selected".to_string()));
    }

    let Some(extension) = allowed_extension(&original_name) else {
        return Err(AppError::Validation(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    };

    if let Some(technique_id) = upload.technique_id {
        if database::find_technique(db, technique_id).await?.is_none() {
            return Err(AppError::NotFound("Technique not found".to_string()));
        }
    }

    if let Some(session_id) = upload.session_id {
        if !database::session_exists(db, user.id, session_id).await? {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
    }

    let stored = match upload.video.as_mut() {
        Some(file) => storage.save(file, user.id, &extension).await?,
        None => return Err(AppError::Validation("No video file provided".to_string())),
    };

    let is_private = upload
        .is_private
        .as_deref()
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    let new_video = NewVideo {
        user_id: user.id,
        technique_id: upload.technique_id,
        session_id: upload.session_id,
        title: non_empty(upload.title.clone()).unwrap_or_else(|| DEFAULT_VIDEO_TITLE.to_string()),
        filename: stored.filename.clone(),
        file_path: stored.path.to_string_lossy().into_owned(),
        file_size: Some(stored.size),
        technique_name: Some(upload.technique_name.clone().unwrap_or_default()),
        style: Some(upload.style.clone().unwrap_or_default()),
        description: Some(upload.description.clone().unwrap_or_default()),
        is_private,
    };

    let video = match database::insert_video(db, &new_video).await {
        Ok(video) => video,
        Err(err) => {
            storage.remove(&stored.path).await;
            return Err(err);
        }
    };

    Ok(Custom(
        Status::Created,
        Json(VideoMessageResponse {
            message: "Video uploaded successfully".to_string(),
            video,
        }),
    ))
}

#[get("/training/videos/<id>")]
pub async fn get_video(
    user: User,
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<VideoResponse>, AppError> {
    let video = database::get_video(db, user.id, id).await?;
    Ok(Json(VideoResponse { video }))
}

#[put("/training/videos/<id>", data = "<update>")]
pub async fn update_video(
    user: User,
    id: i64,
    update: Json<VideoUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<VideoMessageResponse>, AppError> {
    let update = update.validate_custom()?;

    let changes = VideoChanges {
        title: update.title,
        description: update.description,
        is_private: update.is_private,
        technique_id: update.technique_id,
        session_id: update.session_id,
    };

    let video = database::update_video(db, user.id, id, &changes).await?;

    Ok(Json(VideoMessageResponse {
        message: "Video updated successfully".to_string(),
        video,
    }))
}

#[delete("/training/videos/<id>")]
pub async fn delete_video(
    user: User,
    id: i64,
    db: &State<Pool<Sqlite>>,
    storage: &State<VideoStorage>,
) -> Result<Json<MessageResponse>, AppError> {
    let video = database::get_video(db, user.id, id).await?;

    storage.remove(Path::new(&video.file_path)).await;
    database::delete_video(db, user.id, id).await?;

    Ok(MessageResponse::new("Video deleted successfully"))
}

#[get("/training/videos/<id>/stream")]
pub async fn stream_video(
    user: StreamUser,
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<(ContentType, NamedFile), AppError> {
    let StreamUser(user) = user;
    let video = database::get_video(db, user.id, id).await?;

    let file = NamedFile::open(&video.file_path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound("Video file not found on server".to_string())
        } else {
            AppError::Storage(err)
        }
    })?;

    Ok((content_type_for(&video.filename), file))
}
