//! # Error Handling
//!
//! This module defines custom error types and how they're converted to HTTP responses.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant represents a different kind of failure
//! - **Pattern matching**: `match` decides the status code and body per variant
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets `?` turn lower-level errors into `AppError`
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings
//!
//! ## Two response shapes:
//! - An unknown call identifier answers HTTP 200 with exactly
//!   `{"error": "Invalid call ID"}`, the shape coaching clients already check for.
//! - Everything else uses the `{"error": {"type", "message", "timestamp"}}` envelope
//!   with a status code that tells the failure kinds apart.

use crate::ai::gateway::GatewayError;
use crate::calls::orchestrator::CallError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Message body for unknown call identifiers.
pub const INVALID_CALL_ID: &str = "Invalid call ID";

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **InvalidCallId**: call identifier unknown to the session store (200, legacy shape)
/// - **Conflict**: caller-supplied call identifier already used (409)
/// - **UpstreamMalformed**: the completion service answered with unusable content (502)
/// - **UpstreamUnavailable**: the completion service could not be reached or refused (502)
/// - **Internal**: Server-side problems (500)
/// - **BadRequest**: Client sent invalid data (400)
/// - **NotFound**: Requested resource doesn't exist (404)
/// - **ConfigError**: Configuration problems (500)
/// - **ValidationError**: Data validation failed (400)
#[derive(Debug)]
pub enum AppError {
    InvalidCallId(String),

    Conflict(String),

    UpstreamMalformed(String),

    UpstreamUnavailable(String),

    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidCallId(id) => write!(f, "{} ({})", INVALID_CALL_ID, id),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::UpstreamMalformed(msg) => write!(f, "Malformed AI response: {}", msg),
            AppError::UpstreamUnavailable(msg) => write!(f, "AI service unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl AppError {
    /// Machine-readable error type, as reported in the response envelope.
    pub fn kind(&self) -> &'static str {
        self.status_and_type().1
    }

    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidCallId(_) => (StatusCode::OK, "invalid_call_id"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::UpstreamMalformed(_) => (StatusCode::BAD_GATEWAY, "upstream_malformed_response"),
            AppError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::InvalidCallId(_) => INVALID_CALL_ID.to_string(),
            AppError::Conflict(msg)
            | AppError::UpstreamMalformed(msg)
            | AppError::UpstreamUnavailable(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ConfigError(msg)
            | AppError::ValidationError(msg) => msg.clone(),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## JSON Response Format:
/// ```json
/// {"error": "Invalid call ID"}
/// ```
/// for unknown call identifiers, otherwise:
/// ```json
/// {
///   "error": {
///     "type": "upstream_malformed_response",
///     "message": "expected value at line 1 column 1",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status_and_type().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type) = self.status_and_type();

        if let AppError::InvalidCallId(_) = self {
            return HttpResponse::build(status).json(json!({ "error": INVALID_CALL_ID }));
        }

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": self.message(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        if err.is_malformed() {
            AppError::UpstreamMalformed(err.to_string())
        } else {
            AppError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::InvalidCallId(id) => AppError::InvalidCallId(id),
            CallError::DuplicateCallId(id) => {
                AppError::Conflict(format!("Call ID {} already exists", id))
            }
            CallError::Gateway(e) => e.into(),
        }
    }
}

/// When you use `?` with an anyhow::Error, it becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always due to the client sending malformed data,
/// so they should result in a 400 (Bad Request) response.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
