#[macro_use]
extern crate rocket;

pub mod api;
pub mod auth;
pub mod config;
pub mod cors;
pub mod database;
pub mod error;
pub mod models;
pub mod seed;
pub mod storage;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use chrono::Duration;
use rocket::data::{Limits, ToByteUnit};
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use tracing::info;

use auth::{forbidden_api, unauthorized_api, TokenService};
use config::AppConfig;
use cors::CorsFairing;
use storage::VideoStorage;
use telemetry::TelemetryFairing;

/// Builds the server around an already migrated pool.
pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting dojo tracker");

    let upload_limit = config.max_upload_mb.mebibytes();
    let limits = Limits::default()
        .limit("data-form", upload_limit)
        .limit("file", upload_limit);
    let figment = rocket::Config::figment().merge(("limits", limits));

    let tokens = TokenService::new(
        &config.jwt_secret,
        Duration::hours(config.token_ttl_hours),
    );
    let storage = VideoStorage::new(config.upload_dir.clone());
    let cors = CorsFairing::new(config.cors_allowed_origin.clone());

    rocket::custom(figment)
        .manage(pool)
        .manage(tokens)
        .manage(storage)
        .manage(config)
        .mount("/api", api::routes())
        .register(
            "/",
            catchers![
                api::bad_request,
                unauthorized_api,
                forbidden_api,
                api::not_found,
                api::payload_too_large,
                api::unprocessable,
                api::internal_error,
            ],
        )
        .attach(TelemetryFairing)
        .attach(cors)
}
