pub mod progress;
pub mod sessions;
pub mod techniques;
pub mod users;
pub mod videos;

pub use progress::*;
pub use sessions::*;
pub use techniques::*;
pub use users::*;
pub use videos::*;

use std::collections::BTreeMap;
use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the pool with foreign keys enforced and applies pending migrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    info!("Running database migrations...");
    MIGRATOR.run(&pool).await?;
    info!("Migrations completed successfully");

    Ok(pool)
}

/// A `GROUP BY` bucket.
#[derive(sqlx::FromRow)]
pub(crate) struct KeyCount {
    pub key: String,
    pub count: i64,
}

impl KeyCount {
    pub(crate) fn into_map(rows: Vec<KeyCount>) -> BTreeMap<String, i64> {
        rows.into_iter().map(|row| (row.key, row.count)).collect()
    }
}
