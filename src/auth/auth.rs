use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::database::get_user;
use crate::error::{AppError, ErrorResponse};

use super::{TokenService, User};

/// A user authenticated by header or by the `token` query parameter.
///
/// Browsers cannot attach an `Authorization` header to a `<video>` source, so
/// the stream route alone accepts the bearer token in the URL.
pub struct StreamUser(pub User);

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn query_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .query_value::<&str>("token")
        .and_then(Result::ok)
        .filter(|token| !token.is_empty())
}

async fn authenticate(request: &Request<'_>, token: Option<&str>) -> Outcome<User, AppError> {
    let Some(token) = token else {
        return Outcome::Error((
            Status::Unauthorized,
            AppError::Authentication("Missing bearer token".to_string()),
        ));
    };

    let (Some(tokens), Some(db)) = (
        request.rocket().state::<TokenService>(),
        request.rocket().state::<SqlitePool>(),
    ) else {
        tracing::error!("Token service or database pool not found in managed state");
        return Outcome::Error((
            Status::InternalServerError,
            AppError::Internal("Authentication services unavailable".to_string()),
        ));
    };

    let user_id = match tokens.verify(token) {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::warn!(error = %err, "Rejected bearer token");
            return Outcome::Error((Status::Unauthorized, err));
        }
    };

    match get_user(db, user_id).await {
        Ok(user) => {
            tracing::debug!(username = %user.username, role = %user.role.as_str(), "User authenticated via bearer token");
            Outcome::Success(user)
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(user_id, "Token subject no longer exists");
            Outcome::Error((
                Status::Unauthorized,
                AppError::Authentication("Unknown user".to_string()),
            ))
        }
        Err(err) => {
            tracing::error!(user_id, error = ?err, "Failed to fetch user for valid token");
            Outcome::Error((Status::InternalServerError, err))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request, bearer_token(request))
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StreamUser {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = bearer_token(request).or_else(|| query_token(request));

        authenticate(request, token)
            .instrument(tracing::info_span!("stream_auth_guard"))
            .await
            .map(StreamUser)
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Json<ErrorResponse> {
    tracing::warn!("Unauthorized access attempt");
    Json(ErrorResponse::new("Authentication required"))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Json<ErrorResponse> {
    tracing::warn!("Forbidden access attempt");
    Json(ErrorResponse::new("Permission denied"))
}
