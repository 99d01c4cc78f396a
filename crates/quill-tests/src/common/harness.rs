// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! [`TestApp`] builds the production router over in-memory stores and a
//! [`ManualClock`], and drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use quill_api::{ApiConfig, AppState, build_router};
use quill_core::{
    Clock, ManualClock, MemoryRefreshTokenStore, MemoryUserStore, RefreshTokenStore, UserId,
    UserStore,
};

use super::fixtures::{ConfigFixtures, UserFixture};

/// Client address used when a test does not pick one.
pub const DEFAULT_CLIENT: &str = "203.0.113.10";

// =============================================================================
// TestApp
// =============================================================================

/// The full application, in process.
pub struct TestApp {
    /// The router under test.
    pub router: Router,
    /// Shared state behind the router.
    pub state: AppState,
    /// Clock used by token issuance, validation and the stores.
    pub clock: ManualClock,
    /// User store behind the service.
    pub users: Arc<MemoryUserStore>,
    /// Refresh token store behind the service.
    pub tokens: Arc<MemoryRefreshTokenStore>,
}

impl TestApp {
    /// Creates an app with [`ConfigFixtures::default_config`].
    pub fn new() -> Self {
        Self::with_config(ConfigFixtures::default_config())
    }

    /// Creates an app with in-memory stores and a manual clock.
    pub fn with_config(config: ApiConfig) -> Self {
        let clock = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let users = Arc::new(MemoryUserStore::with_clock(shared.clone()));
        let tokens = Arc::new(MemoryRefreshTokenStore::with_clock(shared.clone()));

        Self::assemble(config, clock, users.clone(), tokens.clone(), users, tokens)
    }

    /// Creates an app whose service talks to `user_store` while the
    /// harness keeps handles to plain memory stores for inspection.
    pub fn with_user_store(config: ApiConfig, user_store: Arc<dyn UserStore>) -> Self {
        let clock = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let users = Arc::new(MemoryUserStore::with_clock(shared.clone()));
        let tokens = Arc::new(MemoryRefreshTokenStore::with_clock(shared));

        Self::assemble(config, clock, user_store, tokens.clone(), users, tokens)
    }

    fn assemble(
        config: ApiConfig,
        clock: ManualClock,
        user_store: Arc<dyn UserStore>,
        token_store: Arc<dyn RefreshTokenStore>,
        users: Arc<MemoryUserStore>,
        tokens: Arc<MemoryRefreshTokenStore>,
    ) -> Self {
        let state = AppState::builder()
            .config(config)
            .clock(Arc::new(clock.clone()))
            .user_store(user_store)
            .token_store(token_store)
            .build()
            .expect("test configuration must be valid");

        Self {
            router: build_router(state.clone()),
            state,
            clock,
            users,
            tokens,
        }
    }

    /// Moves the manual clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Sends a request as-is.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sends a request from `client`, with an optional bearer token and JSON body.
    pub async fn call(
        &self,
        client: &str,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", client);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.send(request).await
    }

    /// GET from the default client.
    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.call(DEFAULT_CLIENT, Method::GET, uri, bearer, None).await
    }

    /// POST JSON from the default client.
    pub async fn post(&self, uri: &str, body: Value, bearer: Option<&str>) -> TestResponse {
        self.call(DEFAULT_CLIENT, Method::POST, uri, bearer, Some(body)).await
    }

    /// POST without a body from the default client.
    pub async fn post_empty(&self, uri: &str, bearer: Option<&str>) -> TestResponse {
        self.call(DEFAULT_CLIENT, Method::POST, uri, bearer, None).await
    }

    /// PUT JSON from the default client.
    pub async fn put(&self, uri: &str, body: Value, bearer: Option<&str>) -> TestResponse {
        self.call(DEFAULT_CLIENT, Method::PUT, uri, bearer, Some(body)).await
    }

    // =========================================================================
    // Flows
    // =========================================================================

    /// Registers `user`.
    pub async fn register(&self, user: &UserFixture) -> TestResponse {
        self.post("/auth/register", user.registration(), None).await
    }

    /// Logs `user` in.
    pub async fn login(&self, user: &UserFixture) -> TestResponse {
        self.post("/auth/login", user.credentials(), None).await
    }

    /// Exchanges a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> TestResponse {
        self.post(
            "/auth/refresh",
            serde_json::json!({ "refresh_token": refresh_token }),
            None,
        )
        .await
    }

    /// Registers and logs in `user`, panicking on failure.
    pub async fn register_and_login(&self, user: &UserFixture) -> Session {
        self.register(user).await.assert_status(StatusCode::CREATED);
        let login = self.login(user).await;
        login.assert_status(StatusCode::OK);
        Session::from_response(&login)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Tokens from a login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Owner.
    pub user_id: UserId,
}

impl Session {
    /// Reads a token pair response.
    pub fn from_response(response: &TestResponse) -> Self {
        let token = |field: &str| {
            response.body[field]
                .as_str()
                .unwrap_or_else(|| panic!("response has no {field}: {}", response.body))
                .to_string()
        };

        Self {
            access_token: token("access_token"),
            refresh_token: token("refresh_token"),
            user_id: response.body["user"]["id"]
                .as_i64()
                .expect("response has no user id"),
        }
    }
}

// =============================================================================
// TestResponse
// =============================================================================

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// JSON body, or `Null` when empty or not JSON.
    pub body: Value,
}

impl TestResponse {
    /// The `error.code` field, if present.
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }

    /// A header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A header parsed as a number.
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        self.header(name).and_then(|v| v.parse().ok())
    }

    /// Asserts the status code.
    #[track_caller]
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "expected {}, got {} with body {}",
            expected, self.status, self.body
        );
        self
    }

    /// Asserts an error response with `status` and `code`.
    #[track_caller]
    pub fn assert_error(&self, status: StatusCode, code: &str) -> &Self {
        self.assert_status(status);
        assert_eq!(
            self.error_code(),
            Some(code),
            "unexpected error body {}",
            self.body
        );
        self
    }
}
