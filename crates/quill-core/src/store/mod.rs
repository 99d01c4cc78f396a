// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persistence abstractions for users and refresh tokens.
//!
//! The auth service only talks to these traits. Implementations must give
//! the guarantees documented on each method; in particular
//! [`RefreshTokenStore::claim`] must be atomic with respect to concurrent
//! callers presenting the same token.

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::model::{NewRefreshToken, NewUser, RefreshToken, User, UserId};

pub use memory::{MemoryRefreshTokenStore, MemoryUserStore};

// =============================================================================
// UserStore
// =============================================================================

/// User repository.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` with field `username` or `email` when either
    /// is already taken (emails compare case-insensitively).
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    /// Fetches a user by id, including soft-deleted users.
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Fetches a user by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fetches a user by username.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Replaces the stored password hash.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the user does not exist.
    async fn update_password_hash(&self, id: UserId, password_hash: String) -> StoreResult<()>;
}

// =============================================================================
// RefreshTokenStore
// =============================================================================

/// Refresh-token repository.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync + Debug {
    /// Persists a new token.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` with field `token` if the value already exists.
    async fn create(&self, token: NewRefreshToken) -> StoreResult<RefreshToken>;

    /// Looks a token up by its value.
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;

    /// Marks a token revoked. Idempotent; returns `false` if no row matched.
    async fn revoke(&self, token: &str) -> StoreResult<bool>;

    /// Conditionally consumes a token.
    ///
    /// Flips `revoked` from `false` to `true` only if the token exists, is
    /// not yet revoked and has not expired at `now`. Returns `true` iff this
    /// call performed the flip. Of any number of concurrent claims on the
    /// same token, at most one returns `true`.
    async fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Revokes every token belonging to `user_id`, returning how many rows
    /// changed state.
    async fn revoke_all_for_user(&self, user_id: UserId) -> StoreResult<u64>;
}
