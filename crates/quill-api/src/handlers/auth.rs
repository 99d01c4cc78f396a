// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication and session handlers.

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::{Instrument, info_span};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{Auth, ClientIp, OptionalAuth, ValidatedJson};
use crate::response::{
    IdentityResponse, MessageResponse, RegisterResponse, RevokedSessionsResponse,
    SessionResponse, TokenPairResponse, UserResponse,
};
use crate::service::Registration;
use crate::state::AppState;

// =============================================================================
// Register
// =============================================================================

/// Registration request body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Requested role.
    #[serde(default)]
    pub role: Option<String>,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .auth()
        .register(Registration {
            username: request.username,
            email: request.email,
            password: request.password,
            name: request.name,
            role: request.role,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserResponse::from(user),
        }),
    ))
}

// =============================================================================
// Login
// =============================================================================

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
}

/// POST /auth/login
///
/// Unknown email, wrong password and deleted accounts all produce the same
/// 401 response. Failures are logged with the client address.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let pair = state
        .auth()
        .login(&request.email, &request.password)
        .instrument(info_span!("login", %client_ip))
        .await?;
    Ok(Json(TokenPairResponse::from(pair)))
}

// =============================================================================
// Refresh
// =============================================================================

/// Refresh request body.
#[derive(Deserialize)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

/// POST /auth/refresh
///
/// Consumes the presented refresh token and returns a new pair.
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.refresh_token.is_empty() {
        return Err(ApiError::validation("refresh_token is required"));
    }

    let pair = state.auth().refresh_access_token(&request.refresh_token).await?;
    Ok(Json(TokenPairResponse::from(pair)))
}

// =============================================================================
// Logout
// =============================================================================

/// Logout request body. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    /// Refresh token to revoke.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?
    };

    state
        .auth()
        .logout(ctx.user_id, request.refresh_token.as_deref())
        .await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// POST /auth/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    Auth(ctx): Auth,
) -> ApiResult<impl IntoResponse> {
    let revoked = state.auth().revoke_all_user_tokens(ctx.user_id).await?;
    Ok(Json(RevokedSessionsResponse {
        user_id: ctx.user_id,
        revoked,
    }))
}

// =============================================================================
// Identity
// =============================================================================

/// GET /auth/me
pub async fn current_user(Auth(ctx): Auth) -> impl IntoResponse {
    Json(IdentityResponse::from(&ctx))
}

/// GET /auth/session
///
/// Reports whether the caller presented a valid access token. Never 401.
pub async fn session(OptionalAuth(ctx): OptionalAuth) -> impl IntoResponse {
    Json(SessionResponse {
        authenticated: ctx.is_some(),
        user: ctx.as_ref().map(IdentityResponse::from),
    })
}

// =============================================================================
// Change Password
// =============================================================================

/// Change password request body.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub current_password: String,
    /// New password.
    pub new_password: String,
}

/// PUT /auth/password
///
/// Every refresh token of the caller is revoked afterwards.
pub async fn change_password(
    State(state): State<AppState>,
    Auth(ctx): Auth,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let revoked = state
        .auth()
        .change_password(ctx.user_id, &request.current_password, &request.new_password)
        .await?;

    Ok(Json(RevokedSessionsResponse {
        user_id: ctx.user_id,
        revoked,
    }))
}
