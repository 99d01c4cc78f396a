// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_core::{Role, User, UserId};

use crate::auth::AuthContext;
use crate::service::TokenPair;

// =============================================================================
// User
// =============================================================================

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: Role,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// The created user.
    pub user: UserResponse,
}

// =============================================================================
// Tokens
// =============================================================================

/// Body of login and refresh responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairResponse {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Token type (always "Bearer").
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// The authenticated user.
    pub user: UserResponse,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            user: UserResponse::from(&pair.user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type.to_string(),
            expires_in: pair.expires_in,
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Identity of the caller as seen by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    /// User id.
    pub user_id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Role.
    pub role: Role,
}

impl From<&AuthContext> for IdentityResponse {
    fn from(ctx: &AuthContext) -> Self {
        Self {
            user_id: ctx.user_id,
            username: ctx.username.clone(),
            email: ctx.email.clone(),
            role: ctx.role,
        }
    }
}

/// Body of `GET /auth/session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Whether a valid access token was presented.
    pub authenticated: bool,
    /// The identity, when authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityResponse>,
}

/// Count of refresh tokens revoked by an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedSessionsResponse {
    /// Affected user.
    pub user_id: UserId,
    /// Number of tokens newly revoked.
    pub revoked: u64,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

impl MessageResponse {
    /// Creates a message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Version string.
    pub version: String,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}
