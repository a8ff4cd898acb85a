use std::collections::HashSet;

use chrono::Utc;
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{
    BulkImportReport, ImportError, NewTechnique, TECHNIQUE_DESCRIPTION_MAX,
    TECHNIQUE_DIFFICULTY_MAX, TECHNIQUE_NAME_MAX, TECHNIQUE_STYLE_MAX, Technique, TechniqueImport,
    TechniqueStats,
};
use crate::validation::truncate_chars;

use super::KeyCount;

pub const DEFAULT_IMPORT_STYLE: &str = "General";
pub const DEFAULT_IMPORT_DIFFICULTY: &str = "Intermediate";
pub const UNSPECIFIED: &str = "Unspecified";

const TECHNIQUE_COLUMNS: &str =
    "id, name, description, style, difficulty, reference_video_url, created_at";

#[instrument]
pub async fn list_techniques(
    pool: &Pool<Sqlite>,
    style: Option<&str>,
    difficulty: Option<&str>,
) -> Result<Vec<Technique>, AppError> {
    info!("Listing techniques");
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM techniques WHERE 1 = 1",
        TECHNIQUE_COLUMNS
    ));

    if let Some(style) = style {
        query.push(" AND style = ").push_bind(style);
    }
    if let Some(difficulty) = difficulty {
        query.push(" AND difficulty = ").push_bind(difficulty);
    }
    query.push(" ORDER BY id");

    Ok(query.build_query_as::<Technique>().fetch_all(pool).await?)
}

#[instrument]
pub async fn find_technique(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Technique>, AppError> {
    Ok(sqlx::query_as::<_, Technique>(&format!(
        "SELECT {} FROM techniques WHERE id = ?",
        TECHNIQUE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

#[instrument]
pub async fn get_technique(pool: &Pool<Sqlite>, id: i64) -> Result<Technique, AppError> {
    info!("Fetching technique by ID");
    find_technique(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Technique not found".to_string()))
}

#[instrument(skip(pool))]
pub async fn create_technique(
    pool: &Pool<Sqlite>,
    technique: &NewTechnique,
) -> Result<Technique, AppError> {
    info!("Creating technique");
    let res = sqlx::query(
        "INSERT INTO techniques (name, description, style, difficulty, reference_video_url, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&technique.name)
    .bind(&technique.description)
    .bind(&technique.style)
    .bind(&technique.difficulty)
    .bind(&technique.reference_video_url)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_technique(pool, res.last_insert_rowid()).await
}

pub async fn count_techniques(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM techniques")
        .fetch_one(pool)
        .await?)
}

/// Fills import defaults and cuts every field to its column cap.
pub fn normalize_import(item: &TechniqueImport) -> Option<NewTechnique> {
    let name = item
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    Some(NewTechnique {
        name: truncate_chars(name, TECHNIQUE_NAME_MAX),
        description: Some(truncate_chars(
            item.description.as_deref().unwrap_or_default(),
            TECHNIQUE_DESCRIPTION_MAX,
        )),
        style: Some(truncate_chars(
            item.style.as_deref().unwrap_or(DEFAULT_IMPORT_STYLE),
            TECHNIQUE_STYLE_MAX,
        )),
        difficulty: Some(truncate_chars(
            item.difficulty.as_deref().unwrap_or(DEFAULT_IMPORT_DIFFICULTY),
            TECHNIQUE_DIFFICULTY_MAX,
        )),
        reference_video_url: item.reference_video_url.clone(),
    })
}

/// Imports a batch inside one transaction, skipping any (name, style) pair
/// already in the catalog or earlier in the batch.
#[instrument(skip(pool, items), fields(batch_size = items.len()))]
pub async fn bulk_import(
    pool: &Pool<Sqlite>,
    items: &[TechniqueImport],
) -> Result<BulkImportReport, AppError> {
    info!("Bulk importing techniques");
    let mut report = BulkImportReport::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    for item in items {
        let Some(technique) = normalize_import(item) else {
            report.errors.push(ImportError {
                name: "missing".to_string(),
                error: "Name is required".to_string(),
            });
            continue;
        };

        let style = technique.style.clone().unwrap_or_default();
        let key = (technique.name.clone(), style.clone());

        if seen.contains(&key) {
            report.skipped += 1;
            continue;
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM techniques WHERE name = ? AND style = ? LIMIT 1")
                .bind(&technique.name)
                .bind(&style)
                .fetch_optional(&mut *tx)
                .await?;

        seen.insert(key);

        if existing.is_some() {
            report.skipped += 1;
            continue;
        }

        let inserted = sqlx::query(
            "INSERT INTO techniques (name, description, style, difficulty, reference_video_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&technique.name)
        .bind(&technique.description)
        .bind(&technique.style)
        .bind(&technique.difficulty)
        .bind(&technique.reference_video_url)
        .bind(now)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => report.imported += 1,
            Err(err) => {
                warn!(name = %technique.name, error = %err, "Failed to import technique");
                report.errors.push(ImportError {
                    name: technique.name,
                    error: err.to_string(),
                });
            }
        }
    }

    tx.commit().await?;

    report.total_techniques = count_techniques(pool).await?;
    info!(
        imported = report.imported,
        skipped = report.skipped,
        errors = report.errors.len(),
        "Bulk import completed"
    );

    Ok(report)
}

/// Returns how many of `ids` were deleted.
#[instrument(skip(pool, ids), fields(requested = ids.len()))]
pub async fn bulk_delete(pool: &Pool<Sqlite>, ids: &[i64]) -> Result<i64, AppError> {
    info!("Bulk deleting techniques");
    if ids.is_empty() {
        return Ok(0);
    }

    let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM techniques WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let res = query.build().execute(pool).await?;
    Ok(res.rows_affected() as i64)
}

#[instrument(skip(pool))]
pub async fn clear_all(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    warn!("Clearing the technique catalog");
    let mut tx = pool.begin().await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM techniques")
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM techniques").execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(count)
}

#[instrument(skip(pool))]
pub async fn technique_stats(pool: &Pool<Sqlite>) -> Result<TechniqueStats, AppError> {
    let total = count_techniques(pool).await?;

    let by_style = sqlx::query_as::<_, KeyCount>(
        "SELECT COALESCE(style, ?) AS key, COUNT(*) AS count
         FROM techniques GROUP BY COALESCE(style, ?)",
    )
    .bind(UNSPECIFIED)
    .bind(UNSPECIFIED)
    .fetch_all(pool)
    .await?;

    let by_difficulty = sqlx::query_as::<_, KeyCount>(
        "SELECT COALESCE(difficulty, ?) AS key, COUNT(*) AS count
         FROM techniques GROUP BY COALESCE(difficulty, ?)",
    )
    .bind(UNSPECIFIED)
    .bind(UNSPECIFIED)
    .fetch_all(pool)
    .await?;

    Ok(TechniqueStats {
        total,
        by_style: KeyCount::into_map(by_style),
        by_difficulty: KeyCount::into_map(by_difficulty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_defaults_and_caps() {
        let item = TechniqueImport {
            name: Some("x".repeat(150)),
            style: None,
            ..Default::default()
        };
        let technique = normalize_import(&item).unwrap();
        assert_eq!(technique.name.chars().count(), TECHNIQUE_NAME_MAX);
        assert_eq!(technique.style.as_deref(), Some(DEFAULT_IMPORT_STYLE));
        assert_eq!(technique.difficulty.as_deref(), Some(DEFAULT_IMPORT_DIFFICULTY));
        assert_eq!(technique.description.as_deref(), Some(""));
    }

    #[test]
    fn import_requires_name() {
        assert!(normalize_import(&TechniqueImport::default()).is_none());
        let blank = TechniqueImport {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(normalize_import(&blank).is_none());
    }
}
