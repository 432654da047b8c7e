/// Unified error types for Agora
use crate::reports::{ItemType, ReportStatus};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server and its collaborator stores
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failures from any other backend (mail relay, external store)
    #[error("Remote operation failed: {0}")]
    Remote(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Capability or role check failed
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate account)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Report is not in a state that allows the requested transition
    #[error("Report {report_id} cannot move from {from} to {to}")]
    InvalidTransition {
        report_id: String,
        from: ReportStatus,
        to: ReportStatus,
    },

    /// Report was marked removed but the reported content could not be deleted
    #[error("Report {report_id} is marked removed but {item_type} {item_id} still exists: {reason}")]
    InconsistentState {
        report_id: String,
        item_type: ItemType,
        item_id: String,
        reason: String,
    },

    /// Account banned by a moderator
    #[error("Account banned: {0}")]
    AccountBanned(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),
}

impl AppError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Remote(_) => "remote",
            AppError::Authentication(_) | AppError::Jwt(_) => "authentication",
            AppError::Authorization(_) | AppError::AccountBanned(_) => "authorization",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InconsistentState { .. } => "inconsistent_state",
            AppError::Internal(_) | AppError::Io(_) => "internal",
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        crate::metrics::record_error(self.kind());

        let (status, error_code, message) = match self {
            AppError::Authentication(_) | AppError::Jwt(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            AppError::AccountBanned(_) => {
                (StatusCode::FORBIDDEN, "AccountBanned", self.to_string())
            }
            AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            AppError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "InvalidTransition", self.to_string())
            }
            // Operators need the item coordinates to retry the deletion
            AppError::InconsistentState { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InconsistentState",
                self.to_string(),
            ),
            AppError::Remote(_) => (StatusCode::BAD_GATEWAY, "RemoteFailure", self.to_string()),
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for Agora operations
pub type AppResult<T> = Result<T, AppError>;
