use crate::attendance::export::ExportError;
use crate::gateway::GatewayError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Error returned by request handlers. Renders as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("Recognition service failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::Export(ExportError::NoData) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Gateway(GatewayError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(GatewayError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Database(e) => tracing::error!(error = %e, "Database error"),
            AppError::Internal(detail) => tracing::error!(detail = %detail, "Internal error"),
            AppError::Gateway(e) => tracing::warn!(error = %e, "Recognition gateway error"),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Integrity constraint a failed write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Unique,
    ForeignKey,
}

/// Classifies a store error by driver error kind rather than by SQLSTATE,
/// which MySQL shares between duplicate keys and foreign key failures.
pub fn violation(err: &sqlx::Error) -> Option<Violation> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Some(Violation::Unique),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => Some(Violation::ForeignKey),
        _ => None,
    }
}
