use dojo_tracker::config::{load_environment, AppConfig, ConfigError};
use dojo_tracker::error::AppError;
use dojo_tracker::telemetry::{init_tracing, shutdown_telemetry};
use dojo_tracker::{database, init_rocket};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = load_environment()?;
    let config = AppConfig::from_env()?;

    init_tracing(&config);
    env_files.log();

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!(upload_dir = %config.upload_dir.display(), "Upload directory ready");

    let pool = database::connect(&config.database_url).await?;

    let result = init_rocket(pool, config).launch().await;
    shutdown_telemetry();
    result?;

    Ok(())
}
