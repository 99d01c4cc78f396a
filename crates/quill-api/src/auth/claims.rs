// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Access-token claims.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_core::{Role, User, UserId};

/// Value of the `type` claim on access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by an access token.
///
/// Never persisted; everything here is reconstructed from the signed token.
/// `role` is the closed [`Role`] enum, so a token naming any other role
/// fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub user_id: UserId,
    /// User email.
    pub email: String,
    /// Username.
    pub username: String,
    /// Role.
    pub role: Role,
    /// Token type tag.
    #[serde(rename = "type")]
    pub token_type: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Token id.
    pub jti: String,
}

impl AccessClaims {
    /// Builds access claims for `user`, valid for `ttl_secs` from `issued_at`.
    pub fn for_user(user: &User, issuer: &str, issued_at: DateTime<Utc>, ttl_secs: i64) -> Self {
        let iat = issued_at.timestamp();
        Self {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            iat,
            exp: iat + ttl_secs,
            iss: issuer.to_string(),
            jti: Uuid::now_v7().to_string(),
        }
    }

    /// Returns `true` if the type tag marks an access token.
    pub fn is_access(&self) -> bool {
        self.token_type == ACCESS_TOKEN_TYPE
    }

    /// Returns the expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Returns `true` if the role is admin.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "alice".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            password_hash: String::new(),
            role: Role::Author,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_for_user() {
        let now = Utc::now();
        let claims = AccessClaims::for_user(&user(), "quill", now, 900);

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, Role::Author);
        assert!(claims.is_access());
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.expires_at().map(|t| t.timestamp()), Some(claims.exp));
    }

    #[test]
    fn test_type_claim_name() {
        let claims = AccessClaims::for_user(&user(), "quill", Utc::now(), 60);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "access");
        assert_eq!(json["role"], "author");
        assert!(json.get("token_type").is_none());
        assert!(json.get("user_id").is_some());
        assert!(json.get("sub").is_none());
    }

    #[test]
    fn test_unknown_role_does_not_decode() {
        let mut json = serde_json::to_value(AccessClaims::for_user(&user(), "quill", Utc::now(), 60)).unwrap();
        json["role"] = "superuser".into();
        assert!(serde_json::from_value::<AccessClaims>(json).is_err());
    }
}
