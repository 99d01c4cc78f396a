// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory stores.
//!
//! Thread-safe maps behind `parking_lot::RwLock`. Every mutating method
//! takes the write lock for its whole check-and-set, which is what makes
//! `claim` atomic. Data is lost when the store is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::model::{NewRefreshToken, NewUser, RefreshToken, User, UserId};

use super::{RefreshTokenStore, UserStore};

// =============================================================================
// MemoryUserStore
// =============================================================================

#[derive(Debug, Default)]
struct UserTable {
    rows: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
    by_username: HashMap<String, UserId>,
}

/// An in-memory user store.
#[derive(Debug)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
    next_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl MemoryUserStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping rows with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(UserTable::default()),
            next_id: AtomicI64::new(1),
            clock,
        }
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    /// Returns `true` if no users are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Soft-deletes a user. Returns `false` if the id is unknown.
    pub fn soft_delete(&self, id: UserId) -> bool {
        let now = self.clock.now();
        let mut table = self.table.write();
        match table.rows.get_mut(&id) {
            Some(user) => {
                user.deleted_at = Some(now);
                user.updated_at = now;
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let email_key = user.email.to_lowercase();
        let now = self.clock.now();
        let mut table = self.table.write();

        if table.by_username.contains_key(&user.username) {
            return Err(StoreError::conflict("user", "username"));
        }
        if table.by_email.contains_key(&email_key) {
            return Err(StoreError::conflict("user", "email"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let row = User {
            id,
            username: user.username,
            email: email_key.clone(),
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        table.by_email.insert(email_key, id);
        table.by_username.insert(row.username.clone(), id);
        table.rows.insert(id, row.clone());

        debug!(user_id = id, "User row created");
        Ok(row)
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.table.read().rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let table = self.table.read();
        Ok(table
            .by_email
            .get(&email.to_lowercase())
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let table = self.table.read();
        Ok(table
            .by_username
            .get(username)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn update_password_hash(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        let now = self.clock.now();
        let mut table = self.table.write();
        let user = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;

        user.password_hash = password_hash;
        user.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// MemoryRefreshTokenStore
// =============================================================================

/// An in-memory refresh-token store.
#[derive(Debug)]
pub struct MemoryRefreshTokenStore {
    rows: RwLock<HashMap<String, RefreshToken>>,
    next_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl MemoryRefreshTokenStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping rows with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            clock,
        }
    }

    /// Number of stored tokens, revoked ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if no tokens are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tokens for `user_id` that are usable at `now`.
    pub fn active_count(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        self.rows
            .read()
            .values()
            .filter(|row| row.user_id == user_id && row.is_usable(now))
            .count()
    }
}

impl Default for MemoryRefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, token: NewRefreshToken) -> StoreResult<RefreshToken> {
        let now = self.clock.now();
        let mut rows = self.rows.write();

        if rows.contains_key(&token.token) {
            return Err(StoreError::conflict("refresh_token", "token"));
        }

        let row = RefreshToken {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id: token.user_id,
            token: token.token,
            expires_at: token.expires_at,
            created_at: now,
            updated_at: now,
            revoked: false,
        };
        rows.insert(row.token.clone(), row.clone());
        Ok(row)
    }

    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.rows.read().get(token).cloned())
    }

    async fn revoke(&self, token: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut rows = self.rows.write();
        match rows.get_mut(token) {
            Some(row) => {
                if !row.revoked {
                    row.revoked = true;
                    row.updated_at = now;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim(&self, token: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut rows = self.rows.write();
        match rows.get_mut(token) {
            Some(row) if row.is_usable(now) => {
                row.revoked = true;
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> StoreResult<u64> {
        let now = self.clock.now();
        let mut rows = self.rows.write();
        let mut revoked = 0;
        for row in rows.values_mut() {
            if row.user_id == user_id && !row.revoked {
                row.revoked = true;
                row.updated_at = now;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
