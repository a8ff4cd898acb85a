use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::database;
use crate::error::AppError;
use crate::models::{BulkImportReport, ImportError, TechniqueImport, TechniqueStats};

/// Items stay untyped so one malformed entry is reported instead of
/// failing the whole batch.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BulkImportRequest {
    pub techniques: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BulkDeleteRequest {
    pub technique_ids: Option<Vec<i64>>,
}

#[derive(Serialize, Debug)]
pub struct BulkImportResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: BulkImportReport,
}

#[derive(Serialize, Debug)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted_count: i64,
    pub total_remaining: i64,
}

#[derive(Serialize, Debug)]
pub struct ClearAllResponse {
    pub message: String,
    pub deleted_count: i64,
}

#[post("/admin/techniques/bulk-import", data = "<request>")]
pub async fn bulk_import(
    user: User,
    request: Json<BulkImportRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<BulkImportResponse>, AppError> {
    user.require_permission(Permission::ManageCatalog)?;

    let Some(techniques) = request.into_inner().techniques else {
        return Err(AppError::Validation("Missing techniques data".to_string()));
    };
    let Value::Array(items) = techniques else {
        return Err(AppError::Validation("Techniques must be an array".to_string()));
    };

    let (techniques, rejected) = parse_import_items(items);
    let mut report = database::bulk_import(db, &techniques).await?;
    report.errors.extend(rejected);

    Ok(Json(BulkImportResponse {
        message: "Bulk import completed".to_string(),
        report,
    }))
}

fn parse_import_items(items: Vec<Value>) -> (Vec<TechniqueImport>, Vec<ImportError>) {
    let mut techniques = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("invalid")
            .to_string();

        let parsed = match item {
            Value::Object(_) => serde_json::from_value(item).map_err(|err| err.to_string()),
            _ => Err("Technique must be an object".to_string()),
        };

        match parsed {
            Ok(technique) => techniques.push(technique),
            Err(error) => rejected.push(ImportError { name, error }),
        }
    }

    (techniques, rejected)
}

/// Catalog breakdown for any signed-in user. Failures degrade to zeros.
#[get("/admin/techniques/stats")]
pub async fn technique_stats(user: User, db: &State<Pool<Sqlite>>) -> Json<TechniqueStats> {
    tracing::debug!(user_id = user.id, "Technique stats requested");
    Json(database::technique_stats(db).await.unwrap_or_else(|err| {
        err.log_and_record("Technique stats");
        TechniqueStats::default()
    }))
}

#[delete("/admin/techniques/bulk-delete", data = "<request>")]
pub async fn bulk_delete(
    user: User,
    request: Json<BulkDeleteRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    user.require_permission(Permission::ManageCatalog)?;

    let Some(ids) = request.into_inner().technique_ids else {
        return Err(AppError::Validation("Missing technique_ids".to_string()));
    };

    let deleted_count = database::bulk_delete(db, &ids).await?;
    let total_remaining = database::count_techniques(db).await?;

    Ok(Json(BulkDeleteResponse {
        message: format!("Deleted {} techniques", deleted_count),
        deleted_count,
        total_remaining,
    }))
}

#[delete("/admin/techniques/clear-all")]
pub async fn clear_all(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ClearAllResponse>, AppError> {
    user.require_permission(Permission::ManageCatalog)?;

    let deleted_count = database::clear_all(db).await?;

    Ok(Json(ClearAllResponse {
        message: format!("Cleared all {} techniques", deleted_count),
        deleted_count,
    }))
}
