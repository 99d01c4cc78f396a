// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Store wrappers that inject latency, for deadline tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use quill_core::{NewUser, StoreResult, User, UserId, UserStore};

// =============================================================================
// SlowUserStore
// =============================================================================

/// A user store that sleeps before every call while armed.
#[derive(Debug)]
pub struct SlowUserStore {
    inner: Arc<dyn UserStore>,
    delay: Duration,
    armed: AtomicBool,
    calls: AtomicU64,
}

impl SlowUserStore {
    /// Wraps `inner`, delaying each call by `delay`. Starts armed.
    pub fn new(inner: Arc<dyn UserStore>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            armed: AtomicBool::new(true),
            calls: AtomicU64::new(0),
        }
    }

    /// Enables or disables the delay.
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    /// Number of calls that reached the wrapper.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.armed.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl UserStore for SlowUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        self.pause().await;
        self.inner.create(user).await
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.find_by_email(email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.pause().await;
        self.inner.find_by_username(username).await
    }

    async fn update_password_hash(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        self.pause().await;
        self.inner.update_password_hash(id, password_hash).await
    }
}
