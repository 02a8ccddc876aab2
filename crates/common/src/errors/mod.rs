//! Error types for Fundscope services
//!
//! Provides:
//! - Distinct error types for the failure modes of the query pipeline
//! - HTTP status code mapping
//! - Structured error responses with caller-safe messages
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

    // Rate limiting (6xxx)
    RateLimited,

    // Data errors (7xxx)
    DataUnavailable,
    DataIntegrity,

    // External service errors (8xxx)
    NarrativeGenerationFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationMissing,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::RateLimited => 6001,
            ErrorCode::DataUnavailable => 7001,
            ErrorCode::DataIntegrity => 7002,
            ErrorCode::NarrativeGenerationFailed => 8001,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationMissing => 9002,
            ErrorCode::ConfigurationError => 9003,
            ErrorCode::SerializationError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    /// One of the source collections could not be fetched; no partial
    /// context is ever built from the remaining ones.
    #[error("Data unavailable: failed to fetch {collection}: {message}")]
    DataUnavailable { collection: String, message: String },

    #[error("Data integrity violation: {message}")]
    DataIntegrity { message: String },

    #[error("Narrative generation failed: {message}")]
    NarrativeGenerationFailed { message: String },

    #[error("Configuration missing: {key}")]
    ConfigurationMissing { key: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::DataUnavailable { .. } => ErrorCode::DataUnavailable,
            AppError::DataIntegrity { .. } => ErrorCode::DataIntegrity,
            AppError::NarrativeGenerationFailed { .. } => ErrorCode::NarrativeGenerationFailed,
            AppError::ConfigurationMissing { .. } => ErrorCode::ConfigurationMissing,
            AppError::Configuration(_) => ErrorCode::ConfigurationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::DataIntegrity { .. }
            | AppError::ConfigurationMissing { .. }
            | AppError::Configuration(_)
            | AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::NarrativeGenerationFailed { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message that is safe to hand back to the person who asked the question.
    ///
    /// Internal detail (collection names, upstream bodies, keys) stays in the
    /// logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::RateLimited { .. } => {
                "Too many requests right now. Please try again shortly.".to_string()
            }
            AppError::DataUnavailable { .. } | AppError::DataIntegrity { .. } => {
                "Fundraising data is temporarily unavailable. Please try again in a few minutes."
                    .to_string()
            }
            AppError::NarrativeGenerationFailed { .. } => {
                "The answer could not be phrased right now.".to_string()
            }
            AppError::ConfigurationMissing { .. } | AppError::Configuration(_) => {
                "The assistant is not configured correctly. Please contact an administrator."
                    .to_string()
            }
            AppError::Internal { .. } | AppError::Serialization(_) | AppError::Other(_) => {
                "Something went wrong while answering your question.".to_string()
            }
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
                details,
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_unavailable_mapping() {
        let err = AppError::DataUnavailable {
            collection: "funders".into(),
            message: "connection refused".into(),
        };
        assert_eq!(err.code(), ErrorCode::DataUnavailable);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = AppError::DataUnavailable {
            collection: "contributions".into(),
            message: "https://sheets.internal/secret returned 500".into(),
        };
        let message = err.public_message();
        assert!(!message.contains("sheets.internal"));
        assert!(!message.contains("contributions"));

        let err = AppError::ConfigurationMissing {
            key: "llm.api_key".into(),
        };
        assert!(!err.public_message().contains("api_key"));
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Question must not be empty".into(),
            field: Some("question".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(err.public_message(), "Question must not be empty");
    }

    #[test]
    fn test_numeric_codes_are_distinct() {
        let codes = [
            ErrorCode::ValidationError,
            ErrorCode::RateLimited,
            ErrorCode::DataUnavailable,
            ErrorCode::DataIntegrity,
            ErrorCode::NarrativeGenerationFailed,
            ErrorCode::InternalError,
            ErrorCode::ConfigurationMissing,
            ErrorCode::ConfigurationError,
            ErrorCode::SerializationError,
        ];
        let mut numeric: Vec<u16> = codes.iter().map(|c| c.as_code()).collect();
        numeric.sort_unstable();
        numeric.dedup();
        assert_eq!(numeric.len(), codes.len());
    }
}
