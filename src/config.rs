use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to load environment file {path}: {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Environment files considered at startup. Loading happens before the
/// subscriber exists, so the outcome is reported back for logging later.
#[derive(Debug, Default, PartialEq)]
pub struct EnvFiles {
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
}

impl EnvFiles {
    pub fn log(&self) {
        for path in &self.loaded {
            info!("Loaded environment from: {}", path);
        }
        for path in &self.missing {
            warn!("Environment file {} not found, skipping", path);
        }
    }
}

pub fn load_environment() -> Result<EnvFiles, ConfigError> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    load_env_files(&env_files)
}

fn load_env_files<P: AsRef<Path>>(paths: &[P]) -> Result<EnvFiles, ConfigError> {
    let mut files = EnvFiles::default();

    for path in paths {
        let path = path.as_ref();
        let display = path.display().to_string();

        if !path.exists() {
            files.missing.push(display);
            continue;
        }

        dotenvy::from_filename_override(path).map_err(|source| ConfigError::EnvFile {
            path: display.clone(),
            source,
        })?;
        files.loaded.push(display);
    }

    Ok(files)
}

/// Process-wide settings, read once at startup and handed to Rocket as managed state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub max_upload_mb: u64,
    pub bcrypt_cost: u32,
    pub cors_allowed_origin: String,
    pub otlp_endpoint: Option<String>,
    pub otlp_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://dojo_tracker.db?mode=rwc".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            upload_dir: PathBuf::from("uploads/videos"),
            max_upload_mb: 100,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            cors_allowed_origin: "*".to_string(),
            otlp_endpoint: None,
            otlp_api_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let jwt_secret = match non_empty_var("JWT_SECRET_KEY") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET_KEY not set, using the development secret");
                defaults.jwt_secret
            }
        };

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL").unwrap_or(defaults.database_url),
            jwt_secret,
            token_ttl_hours: parse_var("JWT_ACCESS_TOKEN_EXPIRES_HOURS", defaults.token_ttl_hours)?,
            upload_dir: non_empty_var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_mb: parse_var("MAX_UPLOAD_MB", defaults.max_upload_mb)?,
            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost)?,
            cors_allowed_origin: non_empty_var("CORS_ALLOWED_ORIGIN")
                .unwrap_or(defaults.cors_allowed_origin),
            otlp_endpoint: non_empty_var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            otlp_api_key: non_empty_var("OTLP_API_KEY"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_files_report_loaded_and_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let present = dir.path().join("common.env");
        let absent = dir.path().join("prod.env");
        std::fs::write(&present, "DOJO_ENV_FILE_MARKER=loaded\n").unwrap();

        temp_env::with_var_unset("DOJO_ENV_FILE_MARKER", || {
            let files = load_env_files(&[&present, &absent]).unwrap();

            assert_eq!(files.loaded, vec![present.display().to_string()]);
            assert_eq!(files.missing, vec![absent.display().to_string()]);
            assert_eq!(std::env::var("DOJO_ENV_FILE_MARKER").unwrap(), "loaded");
        });
    }

    #[test]
    #[serial]
    fn malformed_env_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let broken = dir.path().join("broken.env");
        std::fs::write(&broken, "NOT A VALID LINE\n").unwrap();

        let err = load_env_files(&[&broken]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        temp_env::with_vars_unset(
            [
                "DATABASE_URL",
                "JWT_SECRET_KEY",
                "JWT_ACCESS_TOKEN_EXPIRES_HOURS",
                "UPLOAD_FOLDER",
                "MAX_UPLOAD_MB",
            ],
            || {
                let config = AppConfig::from_env().expect("config should load");
                assert_eq!(config.token_ttl_hours, 24);
                assert_eq!(config.upload_dir, PathBuf::from("uploads/videos"));
                assert_eq!(config.max_upload_mb, 100);
                assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
            },
        );
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        temp_env::with_vars(
            [
                ("JWT_SECRET_KEY", Some("s3cret")),
                ("JWT_ACCESS_TOKEN_EXPIRES_HOURS", Some("2")),
                ("UPLOAD_FOLDER", Some("/tmp/dojo")),
            ],
            || {
                let config = AppConfig::from_env().expect("config should load");
                assert_eq!(config.jwt_secret, "s3cret");
                assert_eq!(config.token_ttl_hours, 2);
                assert_eq!(config.upload_dir, PathBuf::from("/tmp/dojo"));
            },
        );
    }

    #[test]
    #[serial]
    fn rejects_malformed_numbers() {
        temp_env::with_var("MAX_UPLOAD_MB", Some("lots"), || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue {
                    key: "MAX_UPLOAD_MB",
                    ..
                }
            ));
        });
    }
}
