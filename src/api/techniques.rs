use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User};
use crate::database;
use crate::error::AppError;
use crate::models::{NewTechnique, Technique};
use crate::validation::JsonValidateExt;

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct CreateTechniqueRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required (at most 100 characters)"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 50, message = "Style must be at most 50 characters"))]
    pub style: Option<String>,
    #[validate(length(max = 20, message = "Difficulty must be at most 20 characters"))]
    pub difficulty: Option<String>,
    #[validate(length(max = 500, message = "Reference video URL is too long"))]
    pub reference_video_url: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct TechniquesResponse {
    pub techniques: Vec<Technique>,
}

#[derive(Serialize, Debug)]
pub struct TechniqueResponse {
    pub technique: Technique,
}

#[derive(Serialize, Debug)]
pub struct CreatedTechniqueResponse {
    pub message: String,
    pub technique: Technique,
}

#[get("/techniques?<style>&<difficulty>")]
pub async fn list_techniques(
    user: User,
    style: Option<&str>,
    difficulty: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TechniquesResponse>, AppError> {
    user.require_permission(Permission::ViewCatalog)?;

    let style = style.filter(|style| !style.is_empty());
    let difficulty = difficulty.filter(|difficulty| !difficulty.is_empty());

    let techniques = database::list_techniques(db, style, difficulty).await?;
    Ok(Json(TechniquesResponse { techniques }))
}

#[get("/techniques/<id>")]
pub async fn get_technique(
    user: User,
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TechniqueResponse>, AppError> {
    user.require_permission(Permission::ViewCatalog)?;

    let technique = database::get_technique(db, id).await?;
    Ok(Json(TechniqueResponse { technique }))
}

#[post("/techniques", data = "<technique>")]
pub async fn create_technique(
    user: User,
    technique: Json<CreateTechniqueRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<CreatedTechniqueResponse>>, AppError> {
    user.require_permission(Permission::CreateTechniques)?;
    let request = technique.validate_custom()?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let technique = database::create_technique(
        db,
        &NewTechnique {
            name: name.to_string(),
            description: request.description,
            style: request.style,
            difficulty: request.difficulty,
            reference_video_url: request.reference_video_url,
        },
    )
    .await?;

    Ok(Custom(
        Status::Created,
        Json(CreatedTechniqueResponse {
            message: "Technique created successfully".to_string(),
            technique,
        }),
    ))
}
