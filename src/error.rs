use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;
use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("You cannot follow yourself!")]
    SelfFollowRejected,

    #[error("User {0} not found")]
    UnknownUser(String),

    #[error("Invalid input")]
    Validation(ValidationErrors),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SelfFollowRejected => StatusCode::BAD_REQUEST,
            AppError::UnknownUser(_) | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
            AppError::Storage(StoreError::Backend(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                json!({ "error": self.to_string() })
            }
            AppError::Storage(e) => {
                if status.is_server_error() {
                    error!(error = %e, "storage error");
                } else {
                    warn!(error = %e, "storage conflict");
                }
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
