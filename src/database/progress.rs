use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    DbTechniqueProgress, ProficiencyStatus, ProgressChanges, ProgressStats, TechniqueProgress,
};

use super::{KeyCount, find_technique};

const PROGRESS_SELECT: &str = "SELECT p.id, p.user_id, p.technique_id, p.proficiency_status, \
     p.is_favorite, p.notes, p.personal_goal, p.practice_count, p.total_practice_time, \
     p.first_practiced, p.last_practiced, p.mastered_at, p.created_at, p.updated_at, \
     t.name AS t_name, t.description AS t_description, t.style AS t_style, \
     t.difficulty AS t_difficulty, t.reference_video_url AS t_reference_video_url, \
     t.created_at AS t_created_at \
     FROM user_technique_progress p \
     LEFT JOIN techniques t ON t.id = p.technique_id";

#[instrument(skip(pool))]
pub async fn list_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    status: Option<ProficiencyStatus>,
    favorites_only: bool,
) -> Result<Vec<TechniqueProgress>, AppError> {
    info!("Listing technique progress");
    let mut query = QueryBuilder::<Sqlite>::new(PROGRESS_SELECT);
    query.push(" WHERE p.user_id = ").push_bind(user_id);

    if let Some(status) = status {
        query
            .push(" AND p.proficiency_status = ")
            .push_bind(status.as_str());
    }
    if favorites_only {
        query.push(" AND p.is_favorite = TRUE");
    }
    query.push(" ORDER BY p.updated_at DESC, p.id DESC");

    let rows = query
        .build_query_as::<DbTechniqueProgress>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(TechniqueProgress::from).collect())
}

#[instrument(skip(pool))]
pub async fn find_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    technique_id: i64,
) -> Result<Option<TechniqueProgress>, AppError> {
    let row = sqlx::query_as::<_, DbTechniqueProgress>(&format!(
        "{} WHERE p.user_id = ? AND p.technique_id = ?",
        PROGRESS_SELECT
    ))
    .bind(user_id)
    .bind(technique_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(TechniqueProgress::from))
}

#[instrument(skip(pool))]
pub async fn get_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    technique_id: i64,
) -> Result<TechniqueProgress, AppError> {
    find_progress(pool, user_id, technique_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Progress not found".to_string()))
}

/// Starts tracking `technique_id`. The flag is false when the pair was
/// already tracked, in which case the existing row is returned untouched.
#[instrument(skip(pool))]
pub async fn start_tracking(
    pool: &Pool<Sqlite>,
    user_id: i64,
    technique_id: i64,
) -> Result<(TechniqueProgress, bool), AppError> {
    info!("Starting technique tracking");
    if find_technique(pool, technique_id).await?.is_none() {
        return Err(AppError::NotFound("Technique not found".to_string()));
    }

    let now = Utc::now();
    let res = sqlx::query(
        "INSERT INTO user_technique_progress
         (user_id, technique_id, proficiency_status, is_favorite, practice_count,
          total_practice_time, first_practiced, created_at, updated_at)
         VALUES (?, ?, ?, FALSE, 0, 0, ?, ?, ?)
         ON CONFLICT (user_id, technique_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(technique_id)
    .bind(ProficiencyStatus::Learning.as_str())
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let created = res.rows_affected() == 1;
    let progress = get_progress(pool, user_id, technique_id).await?;

    Ok((progress, created))
}

/// Applies every change in one transaction.
#[instrument(skip(pool, changes))]
pub async fn update_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    technique_id: i64,
    changes: &ProgressChanges,
) -> Result<TechniqueProgress, AppError> {
    info!("Updating technique progress");
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, DbTechniqueProgress>(&format!(
        "{} WHERE p.user_id = ? AND p.technique_id = ?",
        PROGRESS_SELECT
    ))
    .bind(user_id)
    .bind(technique_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Err(AppError::NotFound("Progress not found".to_string()));
    };

    let mut progress = TechniqueProgress::from(row);
    progress.apply(changes, Utc::now());

    sqlx::query(
        "UPDATE user_technique_progress
         SET proficiency_status = ?, is_favorite = ?, notes = ?, personal_goal = ?,
             practice_count = ?, total_practice_time = ?, last_practiced = ?, mastered_at = ?,
             updated_at = ?
         WHERE id = ?",
    )
    .bind(progress.proficiency_status.as_str())
    .bind(progress.is_favorite)
    .bind(&progress.notes)
    .bind(&progress.personal_goal)
    .bind(progress.practice_count)
    .bind(progress.total_practice_time)
    .bind(progress.last_practiced)
    .bind(progress.mastered_at)
    .bind(progress.updated_at)
    .bind(progress.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(progress)
}

#[instrument(skip(pool))]
pub async fn stop_tracking(
    pool: &Pool<Sqlite>,
    user_id: i64,
    technique_id: i64,
) -> Result<(), AppError> {
    info!("Stopping technique tracking");
    let res =
        sqlx::query("DELETE FROM user_technique_progress WHERE user_id = ? AND technique_id = ?")
            .bind(user_id)
            .bind(technique_id)
            .execute(pool)
            .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Progress not found".to_string()));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn progress_stats(pool: &Pool<Sqlite>, user_id: i64) -> Result<ProgressStats, AppError> {
    let (total_tracked, favorites_count, total_practices, total_practice_time): (
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN is_favorite THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(practice_count), 0),
                COALESCE(SUM(total_practice_time), 0)
         FROM user_technique_progress
         WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let by_status = sqlx::query_as::<_, KeyCount>(
        "SELECT proficiency_status AS key, COUNT(*) AS count
         FROM user_technique_progress
         WHERE user_id = ?
         GROUP BY proficiency_status",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let recent = sqlx::query_as::<_, DbTechniqueProgress>(&format!(
        "{} WHERE p.user_id = ? AND p.last_practiced IS NOT NULL
         ORDER BY p.last_practiced DESC, p.id DESC
         LIMIT 5",
        PROGRESS_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ProgressStats {
        total_tracked,
        by_status: KeyCount::into_map(by_status),
        favorites_count,
        total_practices,
        total_practice_time,
        recently_practiced: recent.into_iter().map(TechniqueProgress::from).collect(),
    })
}
