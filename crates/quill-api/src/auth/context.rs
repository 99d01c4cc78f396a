// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication context.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::{Role, UserId};

use super::AccessClaims;

/// Identity attached to a request after successful authentication.
///
/// Inserted into request extensions by the auth middleware and read by
/// the role and ownership guards and by handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User id.
    pub user_id: UserId,
    /// Role.
    pub role: Role,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Client IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
    /// Request ID for tracing.
    pub request_id: Uuid,
}

impl AuthContext {
    /// Creates a context from validated claims.
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            username: claims.username.clone(),
            email: claims.email.clone(),
            client_ip: None,
            request_id: Uuid::now_v7(),
        }
    }

    /// Sets the client IP address.
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Returns `true` if this context has admin privileges.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Returns `true` if the caller is `user_id`.
    pub fn is_user(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
