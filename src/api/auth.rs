use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Role, TokenService, User};
use crate::config::AppConfig;
use crate::database::{
    authenticate_user, create_user, update_profile as update_user_profile, update_user_password,
    user_video_stats, verify_password,
};
use crate::error::AppError;
use crate::models::UserVideoStats;
use crate::validation::JsonValidateExt;

use super::MessageResponse;

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 80, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Missing username or password"))]
    pub username: String,
    #[validate(length(min = 1, message = "Missing username or password"))]
    pub password: String,
}

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 80, message = "Username cannot be empty"))]
    pub username: Option<String>,
    #[validate(email(message = "A valid email address is required"))]
    pub email: Option<String>,
}

#[derive(Deserialize, Validate, Default)]
#[serde(default)]
pub struct PasswordChangeRequest {
    #[validate(length(
        min = 1,
        message = "Current password and new password are required"
    ))]
    pub current_password: String,
    #[validate(length(
        min = 1,
        message = "Current password and new password are required"
    ))]
    pub new_password: String,
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub message: String,
    pub access_token: String,
    pub user: User,
}

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Serialize, Debug)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

#[post("/auth/register", data = "<registration>")]
pub async fn register(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    tokens: &State<TokenService>,
) -> Result<Custom<Json<AuthResponse>>, AppError> {
    let registration = registration.validate_custom()?;

    let user = create_user(
        db,
        &registration.username,
        &registration.email,
        &registration.password,
        Role::Member,
        config.bcrypt_cost,
    )
    .await?;

    let access_token = tokens.issue(user.id)?;

    Ok(Custom(
        Status::Created,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            access_token,
            user,
        }),
    ))
}

#[post("/auth/login", data = "<login>")]
pub async fn login(
    login: Json<LoginRequest>,
    db: &State<Pool<Sqlite>>,
    tokens: &State<TokenService>,
) -> Result<Json<AuthResponse>, AppError> {
    let login = login.validate_custom()?;

    let user = authenticate_user(db, &login.username, &login.password)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

    let access_token = tokens.issue(user.id)?;

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        access_token,
        user,
    }))
}

#[get("/auth/me")]
pub fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse { user })
}

#[put("/auth/profile", data = "<profile>")]
pub async fn update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = profile.validate_custom()?;

    let user = update_user_profile(
        db,
        user.id,
        profile.username.as_deref(),
        profile.email.as_deref(),
    )
    .await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".to_string(),
        user,
    }))
}

#[put("/auth/password", data = "<password>")]
pub async fn change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<MessageResponse>, AppError> {
    let password = password.validate_custom()?;

    if !verify_password(db, user.id, &password.current_password).await? {
        return Err(AppError::Authentication(
            "Current password is incorrect".to_string(),
        ));
    }

    if password.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    update_user_password(db, user.id, &password.new_password, config.bcrypt_cost).await?;

    Ok(MessageResponse::new("Password changed successfully"))
}

/// Dashboard figures. Failures degrade to zeros.
#[get("/auth/stats")]
pub async fn user_stats(user: User, db: &State<Pool<Sqlite>>) -> Json<UserVideoStats> {
    Json(user_video_stats(db, user.id).await.unwrap_or_else(|err| {
        err.log_and_record("User stats");
        UserVideoStats::default()
    }))
}
