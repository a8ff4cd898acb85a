use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::User;
use crate::database::{self, NewSession, SessionChanges, SessionFilter, DEFAULT_INTENSITY};
use crate::error::AppError;
use crate::models::{SessionStats, TrainingSession, TrainingVideo};
use crate::validation::JsonValidateExt;

use super::{page, MessageResponse};

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub style: Option<String>,
    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration: Option<i64>,
    pub intensity: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub session_date: Option<String>,
}

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct UpdateSessionRequest {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub style: Option<String>,
    #[validate(range(min = 0, message = "Duration cannot be negative"))]
    pub duration: Option<i64>,
    pub intensity: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub session_date: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionMessageResponse {
    pub message: String,
    pub session: TrainingSession,
}

#[derive(Serialize, Debug)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: TrainingSession,
    pub videos: Vec<TrainingVideo>,
    pub video_count: usize,
}

#[derive(Serialize, Debug)]
pub struct SessionDetailResponse {
    pub session: SessionDetail,
}

#[derive(Serialize, Debug)]
pub struct SessionListResponse {
    pub sessions: Vec<TrainingSession>,
    pub count: usize,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

enum DateInput {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

fn parse_date_input(value: &str) -> Option<DateInput> {
    let value = value.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(DateInput::Instant(instant.with_timezone(&Utc)));
    }
    // Browser datetime-local inputs omit the seconds.
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(DateInput::Instant(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(DateInput::Day)
}

fn invalid_date(field: &str, value: &str) -> AppError {
    AppError::Validation(format!(
        "Invalid {} '{}': expected an ISO 8601 date or date-time",
        field, value
    ))
}

/// Parses a session timestamp. Date-only input means midnight UTC.
/// Sub-second precision is dropped so stored values order as text.
pub fn parse_session_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    match parse_date_input(value) {
        Some(DateInput::Instant(instant)) => Ok(instant.trunc_subsecs(0)),
        Some(DateInput::Day(day)) => day
            .and_hms_opt(0, 0, 0)
            .map(|start| start.and_utc())
            .ok_or_else(|| invalid_date("session_date", value)),
        None => Err(invalid_date("session_date", value)),
    }
}

/// Parses an inclusive upper bound. A bare date covers that whole day.
pub fn parse_end_bound(value: &str) -> Result<DateTime<Utc>, AppError> {
    match parse_date_input(value) {
        Some(DateInput::Instant(instant)) => Ok(instant.trunc_subsecs(0)),
        Some(DateInput::Day(day)) => day
            .and_hms_opt(23, 59, 59)
            .map(|end| end.and_utc())
            .ok_or_else(|| invalid_date("end_date", value)),
        None => Err(invalid_date("end_date", value)),
    }
}

fn parse_start_bound(value: &str) -> Result<DateTime<Utc>, AppError> {
    parse_session_date(value).map_err(|_| invalid_date("start_date", value))
}

#[get("/training/sessions?<style>&<start_date>&<end_date>&<limit>&<offset>")]
pub async fn list_sessions(
    user: User,
    style: Option<String>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    limit: Option<i64>,
    offset: Option<i64>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SessionListResponse>, AppError> {
    let (limit, offset) = page(limit, offset);
    let filter = SessionFilter {
        style: style.filter(|style| !style.is_empty()),
        start_date: start_date
            .filter(|value| !value.is_empty())
            .map(parse_start_bound)
            .transpose()?,
        end_date: end_date
            .filter(|value| !value.is_empty())
            .map(parse_end_bound)
            .transpose()?,
        limit,
        offset,
    };

    let (sessions, total) = database::list_sessions(db, user.id, &filter).await?;

    Ok(Json(SessionListResponse {
        count: sessions.len(),
        sessions,
        total,
        limit,
        offset,
    }))
}

#[post("/training/sessions", data = "<session>")]
pub async fn create_session(
    user: User,
    session: Json<CreateSessionRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<SessionMessageResponse>>, AppError> {
    let request = session.validate_custom()?;

    let session_date = match request.session_date.as_deref() {
        Some(value) if !value.trim().is_empty() => parse_session_date(value)?,
        _ => Utc::now().trunc_subsecs(0),
    };

    let new_session = NewSession {
        title: request.title,
        style: request.style.unwrap_or_default(),
        duration: request.duration.unwrap_or(0),
        intensity: request
            .intensity
            .unwrap_or_else(|| DEFAULT_INTENSITY.to_string()),
        description: request.description.unwrap_or_default(),
        notes: request.notes.unwrap_or_default(),
        location: request.location.unwrap_or_default(),
        session_date,
    };

    let session = database::create_session(db, user.id, &new_session).await?;

    Ok(Custom(
        Status::Created,
        Json(SessionMessageResponse {
            message: "Session created successfully".to_string(),
            session,
        }),
    ))
}

/// Totals for the caller's dashboard. Failures degrade to zeros.
#[get("/training/sessions/stats")]
pub async fn session_stats(user: User, db: &State<Pool<Sqlite>>) -> Json<SessionStats> {
    Json(
        database::session_stats(db, user.id)
            .await
            .unwrap_or_else(|err| {
                err.log_and_record("Session stats");
                SessionStats::default()
            }),
    )
}

#[get("/training/sessions/<id>")]
pub async fn get_session(
    user: User,
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SessionDetailResponse>, AppError> {
    let session = database::get_session(db, user.id, id).await?;
    let videos = database::videos_for_session(db, session.id).await?;

    Ok(Json(SessionDetailResponse {
        session: SessionDetail {
            session,
            video_count: videos.len(),
            videos,
        },
    }))
}

#[put("/training/sessions/<id>", data = "<session>")]
pub async fn update_session(
    user: User,
    id: i64,
    session: Json<UpdateSessionRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SessionMessageResponse>, AppError> {
    let request = session.validate_custom()?;

    let changes = SessionChanges {
        title: request.title,
        style: request.style,
        duration: request.duration,
        intensity: request.intensity,
        description: request.description,
        notes: request.notes,
        location: request.location,
        session_date: request
            .session_date
            .as_deref()
            .map(parse_session_date)
            .transpose()?,
    };

    let session = database::update_session(db, user.id, id, &changes).await?;

    Ok(Json(SessionMessageResponse {
        message: "Session updated successfully".to_string(),
        session,
    }))
}

#[delete("/training/sessions/<id>")]
pub async fn delete_session(
    user: User,
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, AppError> {
    let detached = database::delete_session(db, user.id, id).await?;
    tracing::info!(session_id = id, detached, "Session deleted");

    Ok(MessageResponse::new("Session deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn accepts_zulu_naive_and_date_only() {
        let zulu = parse_session_date("2025-03-01T18:30:00Z").unwrap();
        assert_eq!((zulu.hour(), zulu.minute()), (18, 30));

        let offset = parse_session_date("2025-03-01T18:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 16);

        let naive = parse_session_date("2025-03-01T07:15:00").unwrap();
        assert_eq!(naive.hour(), 7);

        let minutes = parse_session_date("2025-03-01T18:30").unwrap();
        assert_eq!((minutes.hour(), minutes.minute(), minutes.second()), (18, 30, 0));

        let spaced = parse_session_date("2025-03-01 06:05").unwrap();
        assert_eq!((spaced.hour(), spaced.minute()), (6, 5));

        let day = parse_session_date("2025-03-01").unwrap();
        assert_eq!((day.day(), day.hour()), (1, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_session_date("next tuesday"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn date_only_end_bound_covers_the_day() {
        let end = parse_end_bound("2025-03-01").unwrap();
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));

        let exact = parse_end_bound("2025-03-01T12:00:00Z").unwrap();
        assert_eq!(exact.hour(), 12);
    }
}
