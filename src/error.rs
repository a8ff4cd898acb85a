use std::collections::HashMap;

use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Validation failed")]
    InvalidInput(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            status: "error".to_string(),
            error: error.to_string(),
            errors: HashMap::new(),
        }
    }
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
                "database_error"
            }
            AppError::Authentication(msg) => {
                warn!(message = %msg, context = %ctx, "Authentication error");
                "authentication_error"
            }
            AppError::Authorization(msg) => {
                warn!(message = %msg, context = %ctx, "Authorization error");
                "authorization_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::InvalidInput(errors) => {
                warn!(errors = %errors, context = %ctx, "Invalid input");
                "validation_error"
            }
            AppError::Conflict(msg) => {
                warn!(message = %msg, context = %ctx, "Conflict error");
                "conflict_error"
            }
            AppError::Storage(err) => {
                error!(error = %err, context = %ctx, "Storage error");
                "storage_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if self.is_server_fault() {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    fn is_server_fault(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_)
        )
    }

    // Conflict stays 400, the status the web client already handles.
    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::InvalidInput(_) => Status::BadRequest,
            AppError::Conflict(_) => Status::BadRequest,
            AppError::Storage(_) => Status::InternalServerError,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        if self.is_server_fault() {
            return ErrorResponse::new("Internal server error");
        }

        let mut response = ErrorResponse::new(&self.to_string());

        if let AppError::InvalidInput(errors) = self {
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|error| {
                        error
                            .message
                            .clone()
                            .unwrap_or_else(|| "Invalid value".into())
                            .to_string()
                    })
                    .collect();

                response.errors.insert(field.to_string(), messages);
            }

            // Headline is the first message of the alphabetically first field.
            let mut fields: Vec<_> = response.errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            if let Some(first) = fields.first().and_then(|(_, messages)| messages.first()) {
                response.error = first.clone();
            }
        }

        response
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()));
        Custom(status, Json(self.to_error_response())).respond_to(req)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        AppError::Authentication(format!("Invalid token: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[test]
    fn server_faults_hide_details() {
        let err = AppError::Internal("disk exploded at /var/secret".to_string());
        assert_eq!(err.status_code(), Status::InternalServerError);
        assert_eq!(err.to_error_response().error, "Internal server error");
    }

    #[test]
    fn conflict_maps_to_bad_request() {
        let err = AppError::Conflict("Username already exists".to_string());
        assert_eq!(err.status_code(), Status::BadRequest);
        assert_eq!(err.to_error_response().error, "Username already exists");
    }

    #[test]
    fn field_errors_are_listed() {
        let errors = Probe {
            name: String::new(),
        }
        .validate()
        .unwrap_err();

        let response = AppError::from(errors).to_error_response();
        assert_eq!(response.error, "Name is required");
        assert_eq!(response.errors["name"], vec!["Name is required".to_string()]);
    }
}
