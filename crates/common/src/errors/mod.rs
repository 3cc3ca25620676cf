//! Error types for the Doublons services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidMergeRequest,

    // Resource errors (4xxx)
    NotFound,
    JobNotFound,
    GroupNotFound,
    RecordNotFound,

    // Conflict errors (5xxx)
    InvalidTransition,
    ScanAlreadyRunning,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    MergeFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidMergeRequest => 1002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::JobNotFound => 4002,
            ErrorCode::GroupNotFound => 4003,
            ErrorCode::RecordNotFound => 4004,

            // Conflicts (5xxx)
            ErrorCode::InvalidTransition => 5001,
            ErrorCode::ScanAlreadyRunning => 5002,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::MergeFailed => 7003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid merge request: {message}")]
    InvalidMergeRequest { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Scan job not found: {id}")]
    JobNotFound { id: String },

    #[error("Duplicate group not found: {id}")]
    GroupNotFound { id: String },

    #[error("Student record not found: {id}")]
    RecordNotFound { id: String },

    // Conflict errors
    #[error("Invalid status transition: {from} does not accept action {action}")]
    InvalidTransition { from: String, action: String },

    #[error("A scan is already running: {job_id}")]
    ScanAlreadyRunning { job_id: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Merge failed, no records were modified: {message}")]
    MergeFailed { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidMergeRequest { .. } => ErrorCode::InvalidMergeRequest,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::JobNotFound { .. } => ErrorCode::JobNotFound,
            AppError::GroupNotFound { .. } => ErrorCode::GroupNotFound,
            AppError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::ScanAlreadyRunning { .. } => ErrorCode::ScanAlreadyRunning,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::MergeFailed { .. } => ErrorCode::MergeFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::InvalidMergeRequest { .. } => {
                StatusCode::BAD_REQUEST
            }

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::JobNotFound { .. }
            | AppError::GroupNotFound { .. }
            | AppError::RecordNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidTransition { .. } | AppError::ScanAlreadyRunning { .. } => {
                StatusCode::CONFLICT
            }

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::MergeFailed { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|field| field.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::JobNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::JobNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_merge_request_error() {
        let err = AppError::InvalidMergeRequest {
            message: "master included in merge set".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_transition_conflict() {
        let err = AppError::InvalidTransition {
            from: "IGNORE".into(),
            action: "surveiller".into(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code().as_code(), 5001);
    }

    #[test]
    fn test_merge_failed_is_server_error() {
        let err = AppError::MergeFailed {
            message: "transaction rolled back".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
