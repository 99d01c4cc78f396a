// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Auth service errors.

use thiserror::Error;

use quill_core::{PasswordError, StoreError, UserId};

use crate::auth::TokenError;
use crate::error::ValidationErrors;

/// Result alias for auth service operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failures of the auth service.
///
/// Converted to HTTP responses through `From<AuthError> for ApiError`.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email, wrong password or deleted account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No refresh token with that value exists.
    #[error("refresh token not found")]
    RefreshTokenNotFound,

    /// The refresh token was revoked or already consumed.
    #[error("refresh token revoked")]
    RefreshTokenRevoked,

    /// The refresh token is past its expiry.
    #[error("refresh token expired")]
    RefreshTokenExpired,

    /// The user does not exist or was deleted.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The caller may not act on this resource.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Username already registered.
    #[error("username already taken")]
    UsernameTaken,

    /// Email already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Token signing or validation failure.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Store failure, including deadlines.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Password worker failure.
    #[error(transparent)]
    Password(#[from] PasswordError),
}
