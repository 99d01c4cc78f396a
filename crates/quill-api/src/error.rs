// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API error types and handling.
//!
//! Every error leaves the server as
//! `{"error":{"code":"ERR_...","message":"...","details":{...}}}` with a
//! status from the table on [`ApiError::status_code`]. Server-side errors
//! are logged in full and rendered with a generic message.

use std::fmt;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quill_core::{PasswordError, StoreError};

use crate::auth::TokenError;
use crate::middleware::rate_limit::{RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET};
use crate::service::AuthError;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ErrorCode
// =============================================================================

/// Machine-readable error codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No `Authorization` header.
    MissingToken,
    /// `Authorization` header is not `Bearer <token>`.
    InvalidFormat,
    /// Access token has expired.
    TokenExpired,
    /// Access token is malformed, tampered or of the wrong type.
    TokenInvalid,
    /// Role check failed.
    InsufficientPermissions,
    /// Ownership check failed.
    AccessDenied,
    /// Resource owner could not be determined.
    OwnershipCheck,
    /// Email or password is wrong.
    InvalidCredentials,
    /// Refresh token is unknown.
    RefreshNotFound,
    /// Refresh token has been revoked or already used.
    RefreshRevoked,
    /// Refresh token has expired.
    RefreshExpired,
    /// General rate limit.
    RateLimit,
    /// Per-endpoint limit on auth routes.
    RateLimitEndpoint,
    /// Request payload failed validation.
    Validation,
    /// Username already registered.
    UsernameTaken,
    /// Email already registered.
    EmailTaken,
    /// Resource not found.
    NotFound,
    /// Request could not be parsed.
    BadRequest,
    /// Unexpected server failure.
    Internal,
    /// A store deadline elapsed.
    Timeout,
}

impl ErrorCode {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingToken => "ERR_AUTH_MISSING_TOKEN",
            ErrorCode::InvalidFormat => "ERR_AUTH_INVALID_FORMAT",
            ErrorCode::TokenExpired => "ERR_AUTH_TOKEN_EXPIRED",
            ErrorCode::TokenInvalid => "ERR_AUTH_TOKEN_INVALID",
            ErrorCode::InsufficientPermissions => "ERR_AUTH_INSUFFICIENT_PERMISSIONS",
            ErrorCode::AccessDenied => "ERR_AUTH_ACCESS_DENIED",
            ErrorCode::OwnershipCheck => "ERR_AUTH_OWNERSHIP_CHECK",
            ErrorCode::InvalidCredentials => "ERR_AUTH_INVALID_CREDENTIALS",
            ErrorCode::RefreshNotFound => "ERR_AUTH_REFRESH_NOT_FOUND",
            ErrorCode::RefreshRevoked => "ERR_AUTH_REFRESH_REVOKED",
            ErrorCode::RefreshExpired => "ERR_AUTH_REFRESH_EXPIRED",
            ErrorCode::RateLimit => "ERR_RATE_LIMIT",
            ErrorCode::RateLimitEndpoint => "ERR_RATE_LIMIT_ENDPOINT",
            ErrorCode::Validation => "ERR_VALIDATION",
            ErrorCode::UsernameTaken => "ERR_USERNAME_TAKEN",
            ErrorCode::EmailTaken => "ERR_EMAIL_TAKEN",
            ErrorCode::NotFound => "ERR_NOT_FOUND",
            ErrorCode::BadRequest => "ERR_BAD_REQUEST",
            ErrorCode::Internal => "ERR_INTERNAL",
            ErrorCode::Timeout => "ERR_TIMEOUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ApiError
// =============================================================================

/// API error type with HTTP status code mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// Bad request, validation failure or uniqueness conflict (400).
    #[error("Bad request ({code}): {message}")]
    BadRequest {
        /// Error code.
        code: ErrorCode,
        /// Error message.
        message: String,
        /// Field-specific errors.
        errors: Option<ValidationErrors>,
    },

    /// Authentication failure (401).
    #[error("Unauthorized ({code}): {message}")]
    Unauthorized {
        /// Error code.
        code: ErrorCode,
        /// Error message.
        message: String,
    },

    /// Authorization failure (403).
    #[error("Forbidden ({code}): {message}")]
    Forbidden {
        /// Error code.
        code: ErrorCode,
        /// Error message.
        message: String,
    },

    /// Rate limit exceeded (429).
    #[error("Rate limit exceeded ({code})")]
    RateLimitExceeded {
        /// Error code.
        code: ErrorCode,
        /// Bucket capacity per window.
        limit: u32,
        /// Seconds until the next request would be admitted.
        retry_after: u64,
    },

    /// A dependency did not answer in time (503).
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message (for logging, not user-facing).
        message: String,
    },

    /// Internal server error (500).
    #[error("Internal error ({code}): {message}")]
    Internal {
        /// Error code.
        code: ErrorCode,
        /// Error message (for logging, not user-facing).
        message: String,
    },
}

impl ApiError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: ErrorCode::BadRequest,
            message: message.into(),
            errors: None,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: ErrorCode::Validation,
            message: message.into(),
            errors: None,
        }
    }

    /// Creates a validation error with field errors.
    pub fn validation_with_errors(message: impl Into<String>, errors: ValidationErrors) -> Self {
        Self::BadRequest {
            code: ErrorCode::Validation,
            message: message.into(),
            errors: Some(errors),
        }
    }

    /// Creates a uniqueness conflict error.
    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
            errors: None,
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code,
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    pub fn forbidden(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            message: message.into(),
        }
    }

    /// Creates a rate limit exceeded error.
    pub fn rate_limited(code: ErrorCode, limit: u32, retry_after: u64) -> Self {
        Self::RateLimitExceeded {
            code,
            limit,
            retry_after,
        }
    }

    /// Creates a service unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }

    /// Creates an ownership-resolution error.
    pub fn ownership_check(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::OwnershipCheck,
            message: message.into(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::NotFound { .. } => ErrorCode::NotFound,
            ApiError::ServiceUnavailable { .. } => ErrorCode::Timeout,
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::Forbidden { code, .. }
            | ApiError::RateLimitExceeded { code, .. }
            | ApiError::Internal { code, .. } => *code,
        }
    }

    /// Returns the error code string.
    pub fn error_code(&self) -> &'static str {
        self.code().as_str()
    }

    /// Returns a message that is safe to show to clients.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound { resource } => format!("{} not found", resource),
            ApiError::BadRequest { message, .. }
            | ApiError::Unauthorized { message, .. }
            | ApiError::Forbidden { message, .. } => message.clone(),
            ApiError::RateLimitExceeded { retry_after, .. } => {
                format!("Too many requests. Retry in {} seconds", retry_after)
            }
            ApiError::ServiceUnavailable { .. } => {
                "Service temporarily unavailable, please retry".to_string()
            }
            ApiError::Internal { .. } => "Internal server error".to_string(),
        }
    }

    /// Returns `true` if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ApiError::Internal { .. } | ApiError::ServiceUnavailable { .. }
        )
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::BadRequest {
                errors: Some(errors),
                ..
            } => serde_json::to_value(errors).ok(),
            ApiError::RateLimitExceeded {
                limit, retry_after, ..
            } => Some(serde_json::json!({
                "limit": limit,
                "remaining": 0,
                "retry_after": retry_after,
            })),
            _ => None,
        }
    }
}

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = error_code,
                status = %status,
                "Client error occurred"
            );
        }

        let body = ErrorResponseBody {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.user_message(),
                details: self.error_details(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimitExceeded {
            limit, retry_after, ..
        } = &self
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(*limit));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
            headers.insert(RATE_LIMIT_RESET, HeaderValue::from(*retry_after));
        }

        response
    }
}

// =============================================================================
// Error Response Body
// =============================================================================

/// Error response body structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Collection of field validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationErrors {
    /// Field-specific errors.
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    /// Creates a new validation errors collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field error.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns `true` if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if `field` has an error.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|e| e.field == field)
    }

    /// Converts to an ApiError if there are errors.
    pub fn into_result<T>(self, success: T) -> ApiResult<T> {
        if self.is_empty() {
            Ok(success)
        } else {
            Err(ApiError::validation_with_errors("Validation failed", self))
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation errors", self.fields.len())
    }
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Error message.
    pub message: String,
}

// =============================================================================
// From Implementations
// =============================================================================

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => {
                ApiError::unauthorized(ErrorCode::TokenExpired, "Access token has expired")
            }
            TokenError::Malformed | TokenError::WrongType | TokenError::InvalidSignature => {
                ApiError::unauthorized(ErrorCode::TokenInvalid, "Access token is invalid")
            }
            TokenError::Signing(message) => ApiError::internal(message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout { .. } => ApiError::service_unavailable(err.to_string()),
            StoreError::NotFound { entity, .. } => ApiError::not_found(entity),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized(
                ErrorCode::InvalidCredentials,
                "Invalid email or password",
            ),
            AuthError::RefreshTokenNotFound => {
                ApiError::unauthorized(ErrorCode::RefreshNotFound, "Refresh token not found")
            }
            AuthError::RefreshTokenRevoked => {
                ApiError::unauthorized(ErrorCode::RefreshRevoked, "Refresh token has been revoked")
            }
            AuthError::RefreshTokenExpired => {
                ApiError::unauthorized(ErrorCode::RefreshExpired, "Refresh token has expired")
            }
            AuthError::UserNotFound(_) => ApiError::not_found("user"),
            AuthError::AccessDenied(message) => {
                ApiError::forbidden(ErrorCode::AccessDenied, message)
            }
            AuthError::Validation(errors) => {
                ApiError::validation_with_errors("Validation failed", errors)
            }
            AuthError::UsernameTaken => {
                ApiError::conflict(ErrorCode::UsernameTaken, "Username is already taken")
            }
            AuthError::EmailTaken => {
                ApiError::conflict(ErrorCode::EmailTaken, "Email is already registered")
            }
            AuthError::Token(e) => e.into(),
            AuthError::Store(e) => e.into(),
            AuthError::Password(e) => e.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
