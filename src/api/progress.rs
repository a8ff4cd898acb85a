use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::User;
use crate::database;
use crate::error::AppError;
use crate::models::{ProficiencyStatus, ProgressChanges, ProgressStats, TechniqueProgress};
use crate::validation::JsonValidateExt;

use super::MessageResponse;

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct ProgressUpdateRequest {
    pub proficiency_status: Option<String>,
    pub is_favorite: Option<bool>,
    pub notes: Option<String>,
    #[validate(length(max = 500, message = "Personal goal must be at most 500 characters"))]
    pub personal_goal: Option<String>,
    pub mark_practiced: Option<bool>,
    #[validate(range(min = 0, message = "Practice duration cannot be negative"))]
    pub practice_duration: Option<i64>,
}

impl ProgressUpdateRequest {
    fn into_changes(self) -> Result<ProgressChanges, AppError> {
        let proficiency_status = self
            .proficiency_status
            .as_deref()
            .map(str::parse::<ProficiencyStatus>)
            .transpose()?;

        Ok(ProgressChanges {
            proficiency_status,
            is_favorite: self.is_favorite,
            notes: self.notes,
            personal_goal: self.personal_goal,
            mark_practiced: self.mark_practiced.unwrap_or(false),
            practice_duration: self.practice_duration,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct ProgressListResponse {
    pub progress: Vec<TechniqueProgress>,
    pub count: usize,
}

#[derive(Serialize, Debug)]
pub struct TrackedProgressResponse {
    pub progress: TechniqueProgress,
    pub tracking: bool,
}

#[derive(Serialize, Debug)]
pub struct ProgressMessageResponse {
    pub message: String,
    pub progress: TechniqueProgress,
}

#[get("/progress/techniques?<status>&<favorites>")]
pub async fn list_progress(
    user: User,
    status: Option<&str>,
    favorites: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressListResponse>, AppError> {
    let status = status
        .filter(|status| !status.is_empty())
        .map(str::parse::<ProficiencyStatus>)
        .transpose()?;
    let favorites_only = favorites.is_some_and(|value| value.eq_ignore_ascii_case("true"));

    let progress = database::list_progress(db, user.id, status, favorites_only).await?;

    Ok(Json(ProgressListResponse {
        count: progress.len(),
        progress,
    }))
}

#[get("/progress/techniques/<technique_id>")]
pub async fn get_progress(
    user: User,
    technique_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TrackedProgressResponse>, AppError> {
    let progress = database::get_progress(db, user.id, technique_id).await?;

    Ok(Json(TrackedProgressResponse {
        progress,
        tracking: true,
    }))
}

/// 201 with a fresh row, or 200 with the existing row when already tracked.
#[post("/progress/techniques/<technique_id>")]
pub async fn start_tracking(
    user: User,
    technique_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ProgressMessageResponse>>, AppError> {
    let (progress, created) = database::start_tracking(db, user.id, technique_id).await?;

    let (status, message) = if created {
        (Status::Created, "Started tracking technique")
    } else {
        (Status::Ok, "Already tracking this technique")
    };

    Ok(Custom(
        status,
        Json(ProgressMessageResponse {
            message: message.to_string(),
            progress,
        }),
    ))
}

#[put("/progress/techniques/<technique_id>", data = "<update>")]
pub async fn update_progress(
    user: User,
    technique_id: i64,
    update: Json<ProgressUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressMessageResponse>, AppError> {
    let changes = update.validate_custom()?.into_changes()?;

    let progress = database::update_progress(db, user.id, technique_id, &changes).await?;

    Ok(Json(ProgressMessageResponse {
        message: "Progress updated successfully".to_string(),
        progress,
    }))
}

#[delete("/progress/techniques/<technique_id>")]
pub async fn stop_tracking(
    user: User,
    technique_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, AppError> {
    database::stop_tracking(db, user.id, technique_id).await?;
    Ok(MessageResponse::new("Stopped tracking technique"))
}

/// Failures degrade to zeros.
#[get("/progress/stats")]
pub async fn progress_stats(user: User, db: &State<Pool<Sqlite>>) -> Json<ProgressStats> {
    Json(
        database::progress_stats(db, user.id)
            .await
            .unwrap_or_else(|err| {
                err.log_and_record("Progress stats");
                ProgressStats::default()
            }),
    )
}
