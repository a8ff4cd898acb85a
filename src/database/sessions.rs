use chrono::{DateTime, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{SessionStats, StyleBreakdown, TrainingSession, format_minutes};

const SESSION_COLUMNS: &str = "id, user_id, title, style, duration, intensity, description, notes, \
     location, session_date, created_at, updated_at";

pub const DEFAULT_INTENSITY: &str = "Medium";

#[derive(Debug, Clone)]
pub struct NewSession {
    pub title: String,
    pub style: String,
    pub duration: i64,
    pub intensity: String,
    pub description: String,
    pub notes: String,
    pub location: String,
    pub session_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionChanges {
    pub title: Option<String>,
    pub style: Option<String>,
    pub duration: Option<i64>,
    pub intensity: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub session_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub style: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

#[instrument(skip(pool, session), fields(title = %session.title))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session: &NewSession,
) -> Result<TrainingSession, AppError> {
    info!("Creating training session");
    let now = Utc::now();

    let res = sqlx::query(
        "INSERT INTO training_sessions
         (user_id, title, style, duration, intensity, description, notes, location,
          session_date, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&session.title)
    .bind(&session.style)
    .bind(session.duration)
    .bind(&session.intensity)
    .bind(&session.description)
    .bind(&session.notes)
    .bind(&session.location)
    .bind(session.session_date)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_session(pool, user_id, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<TrainingSession, AppError> {
    sqlx::query_as::<_, TrainingSession>(&format!(
        "SELECT {} FROM training_sessions WHERE id = ? AND user_id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
}

pub async fn session_exists(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM training_sessions WHERE id = ? AND user_id = ?")
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(found.is_some())
}

fn push_session_filters<'a>(
    query: &mut QueryBuilder<'a, Sqlite>,
    user_id: i64,
    filter: &'a SessionFilter,
) {
    query.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(style) = &filter.style {
        query.push(" AND style = ").push_bind(style);
    }
    if let Some(start) = filter.start_date {
        query.push(" AND session_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND session_date <= ").push_bind(end);
    }
}

#[instrument(skip(pool))]
pub async fn list_sessions(
    pool: &Pool<Sqlite>,
    user_id: i64,
    filter: &SessionFilter,
) -> Result<(Vec<TrainingSession>, i64), AppError> {
    info!("Listing training sessions");
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM training_sessions");
    push_session_filters(&mut count_query, user_id, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM training_sessions",
        SESSION_COLUMNS
    ));
    push_session_filters(&mut query, user_id, filter);
    query
        .push(" ORDER BY session_date DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let sessions = query
        .build_query_as::<TrainingSession>()
        .fetch_all(pool)
        .await?;

    Ok((sessions, total))
}

#[instrument(skip(pool, changes))]
pub async fn update_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
    changes: &SessionChanges,
) -> Result<TrainingSession, AppError> {
    info!("Updating training session");
    let mut session = get_session(pool, user_id, session_id).await?;

    if let Some(title) = &changes.title {
        session.title = title.clone();
    }
    if let Some(style) = &changes.style {
        session.style = Some(style.clone());
    }
    if let Some(duration) = changes.duration {
        session.duration = Some(duration);
    }
    if let Some(intensity) = &changes.intensity {
        session.intensity = Some(intensity.clone());
    }
    if let Some(description) = &changes.description {
        session.description = Some(description.clone());
    }
    if let Some(notes) = &changes.notes {
        session.notes = Some(notes.clone());
    }
    if let Some(location) = &changes.location {
        session.location = Some(location.clone());
    }
    if let Some(session_date) = changes.session_date {
        session.session_date = session_date;
    }

    sqlx::query(
        "UPDATE training_sessions
         SET title = ?, style = ?, duration = ?, intensity = ?, description = ?, notes = ?,
             location = ?, session_date = ?, updated_at = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(&session.title)
    .bind(&session.style)
    .bind(session.duration)
    .bind(&session.intensity)
    .bind(&session.description)
    .bind(&session.notes)
    .bind(&session.location)
    .bind(session.session_date)
    .bind(Utc::now())
    .bind(session_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    get_session(pool, user_id, session_id).await
}

/// Detaches the session's videos, then removes the session, atomically.
/// Returns how many videos were detached.
#[instrument]
pub async fn delete_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    session_id: i64,
) -> Result<u64, AppError> {
    info!("Deleting training session");
    let mut tx = pool.begin().await?;

    let owned: Option<i64> =
        sqlx::query_scalar("SELECT id FROM training_sessions WHERE id = ? AND user_id = ?")
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    if owned.is_none() {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    let detached = sqlx::query(
        "UPDATE training_videos SET session_id = NULL, updated_at = ? WHERE session_id = ?",
    )
    .bind(Utc::now())
    .bind(session_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM training_sessions WHERE id = ?")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(detached)
}

#[instrument(skip(pool))]
pub async fn session_stats(pool: &Pool<Sqlite>, user_id: i64) -> Result<SessionStats, AppError> {
    let (total_sessions, total_duration): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(duration), 0) FROM training_sessions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let sessions_by_style = sqlx::query_as::<_, StyleBreakdown>(
        "SELECT style, COUNT(*) AS count, COALESCE(SUM(duration), 0) AS total_duration
         FROM training_sessions
         WHERE user_id = ?
         GROUP BY style
         ORDER BY count DESC, style",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let recent_sessions = sqlx::query_as::<_, TrainingSession>(&format!(
        "SELECT {} FROM training_sessions
         WHERE user_id = ?
         ORDER BY session_date DESC, id DESC
         LIMIT 5",
        SESSION_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(SessionStats {
        total_sessions,
        total_duration,
        duration_formatted: format_minutes(total_duration),
        sessions_by_style,
        recent_sessions,
    })
}
