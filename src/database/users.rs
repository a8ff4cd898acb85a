use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, Role, User};
use crate::error::{AppError, is_unique_violation};

const USER_COLUMNS: &str = "id, username, email, role, created_at";

#[derive(sqlx::FromRow)]
struct Credentials {
    id: i64,
    password_hash: String,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

async fn ensure_available(
    pool: &Pool<Sqlite>,
    username: Option<&str>,
    email: Option<&str>,
    exclude_user_id: i64,
) -> Result<(), AppError> {
    if let Some(username) = username {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(exclude_user_id)
                .fetch_optional(pool)
                .await?;

        if taken.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
    }

    if let Some(email) = email {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(exclude_user_id)
                .fetch_optional(pool)
                .await?;

        if taken.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }

    Ok(())
}

fn conflict_on_unique(error: sqlx::Error) -> AppError {
    if is_unique_violation(&error) {
        AppError::Conflict("Username or email already exists".to_string())
    } else {
        AppError::Database(error)
    }
}

#[instrument(skip(pool, password, bcrypt_cost))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
    bcrypt_cost: u32,
) -> Result<User, AppError> {
    info!("Creating new user");

    ensure_available(pool, Some(username), Some(email), 0).await?;

    let hashed_password = bcrypt::hash(password, bcrypt_cost)?;

    let res = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .bind(role.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(conflict_on_unique)?;

    get_user(pool, res.last_insert_rowid()).await
}

/// Returns the user when `password` matches the stored hash.
#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let credentials = sqlx::query_as::<_, Credentials>(
        "SELECT id, password_hash FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match credentials {
        Some(credentials) if bcrypt::verify(password, &credentials.password_hash).unwrap_or(false) => {
            Ok(Some(get_user(pool, credentials.id).await?))
        }
        _ => Ok(None),
    }
}

#[instrument(skip(pool, password))]
pub async fn verify_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    password: &str,
) -> Result<bool, AppError> {
    let hash: Option<String> = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(hash
        .map(|hash| bcrypt::verify(password, &hash).unwrap_or(false))
        .unwrap_or(false))
}

#[instrument(skip(pool))]
pub async fn update_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<User, AppError> {
    info!("Updating user profile");

    ensure_available(pool, username, email, user_id).await?;

    sqlx::query(
        "UPDATE users
         SET username = COALESCE(?, username), email = COALESCE(?, email)
         WHERE id = ?",
    )
    .bind(username)
    .bind(email)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(conflict_on_unique)?;

    get_user(pool, user_id).await
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt_cost)?;

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_user_role(
    pool: &Pool<Sqlite>,
    username: &str,
    role: Role,
) -> Result<User, AppError> {
    info!("Updating user role");
    let res = sqlx::query("UPDATE users SET role = ? WHERE username = ?")
        .bind(role.as_str())
        .bind(username)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User '{}' not found", username)));
    }

    find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
}
