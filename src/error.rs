use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::middleware::logging::{to_response, Failure};

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("database error: {0}")]
    Database(DbErr),
    #[error("blob storage error: {0}")]
    Blob(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl CatalogError {
    pub fn not_found(entity: &str, id: i32) -> CatalogError {
        CatalogError::NotFound(format!("{entity} with id {id} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::Conflict(_) => StatusCode::CONFLICT,
            CatalogError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CatalogError::Forbidden(_) => StatusCode::FORBIDDEN,
            CatalogError::Database(_) | CatalogError::Blob(_) | CatalogError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "Bad Request",
            CatalogError::NotFound(_) => "Not Found",
            CatalogError::Conflict(_) => "Conflict",
            CatalogError::Unauthorized(_) => "Unauthorized",
            CatalogError::Forbidden(_) => "Forbidden",
            _ => "Internal Server Error",
        }
    }
}

// Unique violations are the only storage failures a caller can act on.
impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                CatalogError::Conflict(format!("Resource already exists: {detail}"))
            }
            _ => CatalogError::Database(err),
        }
    }
}

impl From<ValidationErrors> for CatalogError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reasons: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{field}: {}", reasons.join(", "))
            })
            .collect::<Vec<_>>();
        CatalogError::Validation(format!("Invalid input ({})", fields.join("; ")))
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let failure = if status.is_server_error() {
            Failure::Server(self.to_string())
        } else {
            Failure::Client(self.to_string())
        };

        to_response(
            (
                status,
                Json(json!({
                    "error": self.label(),
                    "message": message
                })),
            ),
            failure,
        )
    }
}
