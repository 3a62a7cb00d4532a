//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid dsn: {0}")]
    Dsn(String),
    #[error("unsupported database kind: {0}")]
    UnsupportedKind(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("table {0} does not exist")]
    TableNotFound(String),
    #[error("insufficient rights to access table {0}")]
    Forbidden(String),
    #[error("row not found in table {0}")]
    RowNotFound(String),
    #[error("table {0} is empty")]
    EmptyResult(String),
    #[error("table {0} does not have a primary key")]
    KeyMissing(String),
    #[error("row already exists in table {0}")]
    Conflict(String),
    #[error("primary key mismatch: path key {expected}, payload key {found}")]
    KeyMismatch { expected: String, found: String },
    #[error("invalid data: {0}")]
    InvalidPayload(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[cfg(feature = "oracle")]
    #[error("database: {0}")]
    Oracle(#[from] oracle::Error),
    #[error("database: {0}")]
    Backend(String),
}

impl AppError {
    /// Numeric class used by the transport layer.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TableNotFound(_) | AppError::RowNotFound(_) | AppError::EmptyResult(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::KeyMismatch { .. } | AppError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::KeyMissing(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::TableNotFound(_) => "table_not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::RowNotFound(_) => "row_not_found",
            AppError::EmptyResult(_) => "empty_result",
            AppError::KeyMissing(_) => "key_missing",
            AppError::Conflict(_) => "conflict",
            AppError::KeyMismatch { .. } => "key_mismatch",
            AppError::InvalidPayload(_) => "invalid_payload",
            AppError::BadRequest(_) => "bad_request",
            _ => "database_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family_maps_to_404() {
        for e in [
            AppError::TableNotFound("t".into()),
            AppError::RowNotFound("t".into()),
            AppError::EmptyResult("t".into()),
        ] {
            assert_eq!(e.status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn payload_errors_are_unprocessable() {
        let mismatch = AppError::KeyMismatch {
            expected: "1".into(),
            found: "2".into(),
        };
        assert_eq!(mismatch.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::InvalidPayload("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::KeyMissing("t".into()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn backend_failures_are_unclassified() {
        let e = AppError::Db(sqlx::Error::PoolClosed);
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code(), "database_error");
        assert_eq!(AppError::Forbidden("t".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("t".into()).status(), StatusCode::CONFLICT);
    }
}
