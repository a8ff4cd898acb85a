//! Operator commands for the dojo tracker database.
//!
//! ```bash
//! dojo-cli seed
//! dojo-cli import techniques.json
//! dojo-cli create-admin --username sensei --email sensei@example.com --password hunter22
//! dojo-cli promote alice
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use dojo_tracker::auth::Role;
use dojo_tracker::config::{load_environment, AppConfig, ConfigError};
use dojo_tracker::database::{self, bulk_import, create_user, set_user_role};
use dojo_tracker::error::AppError;
use dojo_tracker::models::TechniqueImport;
use dojo_tracker::seed::seed_catalog;

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    App(#[from] AppError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid technique file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Parser)]
#[command(
    name = "dojo-cli",
    about = "Dojo tracker maintenance commands",
    long_about = "Seed and import the technique catalog and manage admin accounts"
)]
struct Cli {
    /// Database URL override
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert the starter techniques into an empty catalog
    Seed,
    /// Import a JSON array of techniques
    Import { file: PathBuf },
    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Grant the admin role to an existing user
    Promote { username: String },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let env_files = load_environment()?;
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();
    env_files.log();

    let config = AppConfig::from_env()?;
    let database_url = cli.database_url.unwrap_or(config.database_url);

    info!("Connecting to database: {}", database_url);
    let pool = database::connect(&database_url).await?;

    match cli.command {
        Command::Seed => {
            let count = seed_catalog(&pool).await?;
            println!("Seeded {} techniques", count);
        }
        Command::Import { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| CliError::Read {
                    path: file.clone(),
                    source,
                })?;
            let techniques: Vec<TechniqueImport> =
                serde_json::from_str(&contents).map_err(|source| CliError::Json {
                    path: file.clone(),
                    source,
                })?;

            let report = bulk_import(&pool, &techniques).await?;
            println!(
                "Imported {}, skipped {}, errors {} ({} techniques in catalog)",
                report.imported,
                report.skipped,
                report.errors.len(),
                report.total_techniques
            );
            for error in &report.errors {
                println!("  {}: {}", error.name, error.error);
            }
        }
        Command::CreateAdmin {
            username,
            email,
            password,
        } => {
            let user = create_user(
                &pool,
                &username,
                &email,
                &password,
                Role::Admin,
                config.bcrypt_cost,
            )
            .await?;
            println!("Created admin '{}' (id {})", user.username, user.id);
        }
        Command::Promote { username } => {
            let user = set_user_role(&pool, &username, Role::Admin).await?;
            println!("'{}' is now {}", user.username, user.role);
        }
    }

    pool.close().await;
    Ok(())
}
