pub mod admin;
pub mod auth;
pub mod progress;
pub mod sessions;
pub mod techniques;
pub mod videos;

use rocket::serde::json::Json;
use rocket::{Request, Route};
use serde::{Deserialize, Serialize};

use crate::cors::preflight;
use crate::error::ErrorResponse;

/// Default page size for video and session listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).max(0),
        offset.unwrap_or(0).max(0),
    )
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Bad request"))
}

#[catch(404)]
pub fn not_found(req: &Request) -> Json<ErrorResponse> {
    tracing::debug!(uri = %req.uri(), "No route matched");
    Json(ErrorResponse::new("Resource not found"))
}

#[catch(413)]
pub fn payload_too_large(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Upload exceeds the maximum allowed size"))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Malformed request body"))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Internal server error"))
}

/// Every route served under `/api`.
pub fn routes() -> Vec<Route> {
    routes![
        health,
        preflight,
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        auth::change_password,
        auth::user_stats,
        techniques::list_techniques,
        techniques::get_technique,
        techniques::create_technique,
        admin::bulk_import,
        admin::technique_stats,
        admin::bulk_delete,
        admin::clear_all,
        videos::list_videos,
        videos::upload_video,
        videos::get_video,
        videos::update_video,
        videos::delete_video,
        videos::stream_video,
        sessions::list_sessions,
        sessions::create_session,
        sessions::session_stats,
        sessions::get_session,
        sessions::update_session,
        sessions::delete_session,
        progress::list_progress,
        progress::get_progress,
        progress::start_tracking,
        progress::update_progress,
        progress::stop_tracking,
        progress::progress_stats,
    ]
}
