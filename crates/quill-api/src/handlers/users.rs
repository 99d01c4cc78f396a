// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User and administration handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::IntoResponse,
};

use quill_core::UserId;

use crate::error::{ApiError, ApiResult};
use crate::extractors::Auth;
use crate::response::{RevokedSessionsResponse, UserResponse};
use crate::state::AppState;

fn user_id(path: Result<Path<UserId>, PathRejection>) -> ApiResult<UserId> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::bad_request(format!("Invalid user id: {}", e.body_text())))
}

/// GET /users/{id}
///
/// Guarded by the ownership layer: callers see their own profile, admins
/// see any.
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<UserId>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = user_id(path)?;
    let user = state.auth().get_user(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// POST /admin/users/{id}/revoke-sessions
///
/// Administrative logout-everywhere.
pub async fn revoke_user_sessions(
    State(state): State<AppState>,
    Auth(admin): Auth,
    path: Result<Path<UserId>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = user_id(path)?;
    let revoked = state.auth().revoke_all_user_tokens(id).await?;

    tracing::info!(
        admin_id = admin.user_id,
        user_id = id,
        revoked,
        "Sessions revoked by administrator"
    );

    Ok(Json(RevokedSessionsResponse {
        user_id: id,
        revoked,
    }))
}
