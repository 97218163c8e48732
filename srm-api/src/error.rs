//! HTTP error mapping for srm-api
//!
//! Every failure becomes a status code plus `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use srm_common::api::ApiAuthError;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;
use crate::pipeline::{ExportError, ImportError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential supplied (403)
    #[error("{0}")]
    Forbidden(String),

    /// Credential invalid or expired (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed request or document (400)
    #[error("{0}")]
    BadRequest(String),

    /// Required field missing or blank (400)
    #[error("{0}")]
    Validation(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Import stopped partway; earlier records remain committed (422)
    #[error("{message}")]
    PartialImport {
        message: String,
        failed_index: usize,
        imported_count: usize,
    },

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::PartialImport { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "PARTIAL_IMPORT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let mut detail = json!({
            "code": code,
            "message": self.to_string(),
        });
        if let ApiError::PartialImport {
            failed_index,
            imported_count,
            ..
        } = &self
        {
            detail["failed_index"] = Value::from(*failed_index);
            detail["imported_count"] = Value::from(*imported_count);
        }

        (status, Json(json!({ "error": detail }))).into_response()
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::MissingToken => ApiError::Forbidden(err.to_string()),
            ApiAuthError::Malformed(_)
            | ApiAuthError::InvalidSignature
            | ApiAuthError::Expired { .. } => ApiError::Unauthorized(err.to_string()),
            ApiAuthError::DatabaseError(_) | ApiAuthError::Internal(_) => {
                error!("Authentication failure: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ApiError::Validation(e.to_string()),
            StoreError::NotFound(key) => ApiError::NotFound(format!("Student not found: {}", key)),
            StoreError::Corrupt(_) | StoreError::Database(_) => {
                error!("Store failure: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match &err {
            ImportError::Decode(_) => ApiError::BadRequest(err.to_string()),
            ImportError::Store(_) => {
                error!("Import failure: {}", err);
                ApiError::Internal(err.to_string())
            }
            ImportError::Partial { index, source, .. }
            | ImportError::RolledBack { index, source } => match source {
                StoreError::Validation(_) => ApiError::PartialImport {
                    message: err.to_string(),
                    failed_index: *index,
                    imported_count: err.imported_count(),
                },
                _ => {
                    error!(index = *index, "Import failure: {}", err);
                    ApiError::Internal(err.to_string())
                }
            },
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        error!("Export failure: {}", err);
        ApiError::Internal(err.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
