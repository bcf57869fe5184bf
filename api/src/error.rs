use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use calchat_core::error::{self, ApiError};
use calchat_core::sanitize::{
    ActionFailureKind, action_failure_message, classify_action_failure, sanitize_error_message,
};

use crate::mcp::McpError;
use crate::openai::LlmError;

/// Internal error type that converts to structured API responses.
/// Raw upstream detail is logged here and replaced with user-safe text
/// before anything leaves the process.
#[derive(Debug)]
pub enum AppError {
    /// Client input error (400)
    Validation {
        message: String,
        field: Option<String>,
    },
    /// Upstream throttling (429)
    RateLimited(String),
    /// Collaborator credentials misconfigured (500, fixed message)
    Configuration(String),
    /// Calendar authorization failure (401)
    Unauthorized(String),
    /// Calendar permission failure (403)
    Forbidden(String),
    /// Target event missing (404)
    NotFound(String),
    /// Scheduling conflict (409)
    Conflict(String),
    /// Collaborator unreachable (503)
    UpstreamUnavailable(String),
    /// Anything else — sanitized 500. Carries the raw text for logging only.
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, code, message, field) = match self {
            AppError::Validation { message, field } => {
                (StatusCode::BAD_REQUEST, error::codes::VALIDATION_FAILED, message, field)
            }
            AppError::RateLimited(message) => {
                (StatusCode::TOO_MANY_REQUESTS, error::codes::RATE_LIMITED, message, None)
            }
            AppError::Configuration(message) => {
                tracing::error!("collaborator configuration error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, error::codes::INTERNAL_ERROR, message, None)
            }
            AppError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, error::codes::UNAUTHORIZED, message, None)
            }
            AppError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, error::codes::FORBIDDEN, message, None)
            }
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, error::codes::NOT_FOUND, message, None)
            }
            AppError::Conflict(message) => {
                (StatusCode::CONFLICT, error::codes::CONFLICT, message, None)
            }
            AppError::UpstreamUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error::codes::UPSTREAM_UNAVAILABLE,
                message,
                None,
            ),
            AppError::Internal(raw) => {
                tracing::error!("internal error: {}", raw);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error::codes::INTERNAL_ERROR,
                    sanitize_error_message(&raw).to_string(),
                    None,
                )
            }
        };

        let body = ApiError {
            error: code.to_string(),
            message,
            field,
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited => AppError::RateLimited(err.user_message()),
            LlmError::InvalidApiKey => {
                AppError::Configuration("Language model API configuration error".to_string())
            }
            LlmError::Unavailable => AppError::UpstreamUnavailable(err.user_message()),
            LlmError::Other(raw) => AppError::Internal(raw),
        }
    }
}

impl From<McpError> for AppError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::NotConfigured => AppError::UpstreamUnavailable(
                "Calendar service is currently unavailable. Please try again later.".to_string(),
            ),
            McpError::Transport(raw) => AppError::Internal(raw),
            // Broker failures arrive as free text; classify by the documented
            // substring taxonomy, first match wins.
            McpError::Failed(raw) => {
                let kind = classify_action_failure(&raw);
                match action_failure_message(kind) {
                    Some(message) => match kind {
                        ActionFailureKind::Authorization => {
                            AppError::Unauthorized(message.to_string())
                        }
                        ActionFailureKind::Permission => AppError::Forbidden(message.to_string()),
                        ActionFailureKind::NotFound => AppError::NotFound(message.to_string()),
                        ActionFailureKind::Conflict => AppError::Conflict(message.to_string()),
                        _ => AppError::Internal(raw),
                    },
                    None => match kind {
                        ActionFailureKind::Validation => AppError::Validation {
                            message: raw,
                            field: None,
                        },
                        _ => AppError::Internal(raw),
                    },
                }
            }
        }
    }
}
