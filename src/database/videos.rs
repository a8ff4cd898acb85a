use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbTrainingVideo, TrainingVideo, UserVideoStats, VideoStatus, format_minutes};

use super::{KeyCount, find_technique, session_exists};

const VIDEO_COLUMNS: &str = "id, user_id, technique_id, session_id, title, filename, file_path, \
     file_size, duration, technique_name, style, description, is_private, analysis_status, \
     analysis_score, analysis_feedback, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: i64,
    pub technique_id: Option<i64>,
    pub session_id: Option<i64>,
    pub title: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub technique_name: Option<String>,
    pub style: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub technique_id: Option<i64>,
    pub style: Option<String>,
    pub technique_name: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Metadata patch. The nested options separate "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    pub technique_id: Option<Option<i64>>,
    pub session_id: Option<Option<i64>>,
}

#[instrument(skip(pool, video), fields(user_id = video.user_id, filename = %video.filename))]
pub async fn insert_video(pool: &Pool<Sqlite>, video: &NewVideo) -> Result<TrainingVideo, AppError> {
    info!("Recording uploaded video");
    let now = Utc::now();

    let res = sqlx::query(
        "INSERT INTO training_videos
         (user_id, technique_id, session_id, title, filename, file_path, file_size,
          technique_name, style, description, is_private, analysis_status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(video.user_id)
    .bind(video.technique_id)
    .bind(video.session_id)
    .bind(&video.title)
    .bind(&video.filename)
    .bind(&video.file_path)
    .bind(video.file_size)
    .bind(&video.technique_name)
    .bind(&video.style)
    .bind(&video.description)
    .bind(video.is_private)
    .bind(VideoStatus::Pending.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_video(pool, video.user_id, res.last_insert_rowid()).await
}

/// Owner-scoped lookup. Another user's video is reported as missing.
#[instrument]
pub async fn get_video(
    pool: &Pool<Sqlite>,
    user_id: i64,
    video_id: i64,
) -> Result<TrainingVideo, AppError> {
    let row = sqlx::query_as::<_, DbTrainingVideo>(&format!(
        "SELECT {} FROM training_videos WHERE id = ? AND user_id = ?",
        VIDEO_COLUMNS
    ))
    .bind(video_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(TrainingVideo::from)
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))
}

fn push_video_filters<'a>(
    query: &mut QueryBuilder<'a, Sqlite>,
    user_id: i64,
    filter: &'a VideoFilter,
) {
    query.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(technique_id) = filter.technique_id {
        query.push(" AND technique_id = ").push_bind(technique_id);
    }
    if let Some(style) = &filter.style {
        query.push(" AND style = ").push_bind(style);
    }
    if let Some(technique_name) = &filter.technique_name {
        query.push(" AND technique_name = ").push_bind(technique_name);
    }
}

/// Returns one page of the caller's videos, newest first, and the unpaged total.
#[instrument(skip(pool))]
pub async fn list_videos(
    pool: &Pool<Sqlite>,
    user_id: i64,
    filter: &VideoFilter,
) -> Result<(Vec<TrainingVideo>, i64), AppError> {
    info!("Listing videos");
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM training_videos");
    push_video_filters(&mut count_query, user_id, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM training_videos",
        VIDEO_COLUMNS
    ));
    push_video_filters(&mut query, user_id, filter);
    query
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows = query
        .build_query_as::<DbTrainingVideo>()
        .fetch_all(pool)
        .await?;

    Ok((rows.into_iter().map(TrainingVideo::from).collect(), total))
}

#[instrument(skip(pool))]
pub async fn videos_for_session(
    pool: &Pool<Sqlite>,
    session_id: i64,
) -> Result<Vec<TrainingVideo>, AppError> {
    let rows = sqlx::query_as::<_, DbTrainingVideo>(&format!(
        "SELECT {} FROM training_videos WHERE session_id = ? ORDER BY created_at, id",
        VIDEO_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TrainingVideo::from).collect())
}

/// Applies `changes`. Linking a technique copies its name and style onto the
/// video; a linked session must belong to the same user.
#[instrument(skip(pool, changes))]
pub async fn update_video(
    pool: &Pool<Sqlite>,
    user_id: i64,
    video_id: i64,
    changes: &VideoChanges,
) -> Result<TrainingVideo, AppError> {
    info!("Updating video metadata");
    let mut video = get_video(pool, user_id, video_id).await?;

    if let Some(title) = &changes.title {
        video.title = title.clone();
    }
    if let Some(description) = &changes.description {
        video.description = Some(description.clone());
    }
    if let Some(is_private) = changes.is_private {
        video.is_private = is_private;
    }

    match changes.technique_id {
        Some(Some(technique_id)) => {
            let technique = find_technique(pool, technique_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Technique not found".to_string()))?;
            video.technique_id = Some(technique.id);
            video.technique_name = Some(technique.name);
            video.style = technique.style;
        }
        Some(None) => video.technique_id = None,
        None => {}
    }

    match changes.session_id {
        Some(Some(session_id)) => {
            if !session_exists(pool, user_id, session_id).await? {
                return Err(AppError::NotFound("Session not found".to_string()));
            }
            video.session_id = Some(session_id);
        }
        Some(None) => video.session_id = None,
        None => {}
    }

    sqlx::query(
        "UPDATE training_videos
         SET title = ?, description = ?, is_private = ?, technique_id = ?, technique_name = ?,
             style = ?, session_id = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(&video.title)
    .bind(&video.description)
    .bind(video.is_private)
    .bind(video.technique_id)
    .bind(&video.technique_name)
    .bind(&video.style)
    .bind(video.session_id)
    .bind(Utc::now())
    .bind(video_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    get_video(pool, user_id, video_id).await
}

#[instrument]
pub async fn delete_video(pool: &Pool<Sqlite>, user_id: i64, video_id: i64) -> Result<(), AppError> {
    info!("Deleting video row");
    let res = sqlx::query("DELETE FROM training_videos WHERE id = ? AND user_id = ?")
        .bind(video_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Video not found".to_string()));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn user_video_stats(pool: &Pool<Sqlite>, user_id: i64) -> Result<UserVideoStats, AppError> {
    let (total_videos, total_duration): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(duration), 0.0) FROM training_videos WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let analyzed_videos: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM training_videos WHERE user_id = ? AND analysis_status = ?",
    )
    .bind(user_id)
    .bind(VideoStatus::Completed.as_str())
    .fetch_one(pool)
    .await?;

    let by_style = sqlx::query_as::<_, KeyCount>(
        "SELECT style AS key, COUNT(*) AS count
         FROM training_videos
         WHERE user_id = ? AND style IS NOT NULL AND style <> ''
         GROUP BY style",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(UserVideoStats {
        total_videos,
        total_duration,
        duration_formatted: format_minutes(total_duration as i64 / 60),
        analyzed_videos,
        videos_by_style: KeyCount::into_map(by_style),
    })
}
