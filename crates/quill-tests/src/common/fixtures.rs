// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built users and configurations.

use std::time::Duration;

use serde_json::{Value, json};

use quill_api::{ApiConfig, JwtConfig, RateLimitConfig};
use quill_core::PasswordConfig;

/// Signing secret used by every fixture configuration.
pub const TEST_SECRET: &str = "integration-test-secret-that-is-long-enough";

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing API configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Cheap hashing, no rate limiting, client address from `X-Forwarded-For`.
    pub fn default_config() -> ApiConfig {
        ApiConfig::default()
            .with_jwt(JwtConfig::new(TEST_SECRET))
            .with_password(PasswordConfig::minimal_cost())
            .with_rate_limit(RateLimitConfig {
                trust_proxy_headers: true,
                ..RateLimitConfig::disabled()
            })
    }

    /// As [`default_config`](Self::default_config) with default limits enabled.
    pub fn rate_limited_config() -> ApiConfig {
        Self::default_config().with_rate_limit(RateLimitConfig {
            trust_proxy_headers: true,
            ..RateLimitConfig::default()
        })
    }

    /// As [`rate_limited_config`](Self::rate_limited_config) with a small read limit.
    pub fn tight_read_limit(read: u32) -> ApiConfig {
        Self::default_config().with_rate_limit(RateLimitConfig {
            trust_proxy_headers: true,
            read,
            ..RateLimitConfig::default()
        })
    }

    /// Default limits with room for only `max_keys` buckets.
    pub fn small_registry(max_keys: usize) -> ApiConfig {
        Self::default_config().with_rate_limit(RateLimitConfig {
            trust_proxy_headers: true,
            max_keys,
            ..RateLimitConfig::default()
        })
    }

    /// A store deadline short enough to trip in tests.
    pub fn short_store_timeout() -> ApiConfig {
        Self::default_config().with_store_timeout(Duration::from_millis(50))
    }
}

// =============================================================================
// User Fixtures
// =============================================================================

/// A user to register.
#[derive(Debug, Clone)]
pub struct UserFixture {
    /// Login name.
    pub username: &'static str,
    /// Email address.
    pub email: &'static str,
    /// Plain-text password.
    pub password: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Requested role, if any.
    pub role: Option<&'static str>,
}

impl UserFixture {
    /// Registration body.
    pub fn registration(&self) -> Value {
        let mut body = json!({
            "username": self.username,
            "email": self.email,
            "password": self.password,
            "name": self.name,
        });
        if let Some(role) = self.role {
            body["role"] = json!(role);
        }
        body
    }

    /// Login body.
    pub fn credentials(&self) -> Value {
        json!({ "email": self.email, "password": self.password })
    }
}

/// Fixture providing standard users.
pub struct UserFixtures;

impl UserFixtures {
    /// An author.
    pub fn alice() -> UserFixture {
        UserFixture {
            username: "alice",
            email: "alice@example.com",
            password: "correct-horse-battery",
            name: "Alice Liddell",
            role: None,
        }
    }

    /// Another author.
    pub fn bob() -> UserFixture {
        UserFixture {
            username: "bob",
            email: "bob@example.com",
            password: "hunter2-but-longer",
            name: "Bob Builder",
            role: Some("author"),
        }
    }

    /// An administrator.
    pub fn admin() -> UserFixture {
        UserFixture {
            username: "root_admin",
            email: "admin@example.com",
            password: "admin-password-123",
            name: "Site Admin",
            role: Some("admin"),
        }
    }
}
