// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bearer-token authentication middleware.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, header},
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use crate::auth::{AccessClaims, AuthContext, JwtManager};
use crate::error::{ApiError, ErrorCode};

/// How the middleware reacts to a missing or bad token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject with 401.
    Required,
    /// Continue without an identity.
    Optional,
}

// =============================================================================
// AuthLayer
// =============================================================================

/// Layer for bearer-token authentication.
///
/// On success an [`AuthContext`] is inserted into the request extensions.
/// In [`AuthMode::Required`] every failure ends the request with 401 and a
/// code naming the failed step; in [`AuthMode::Optional`] failures are
/// ignored and the request proceeds anonymously.
#[derive(Clone)]
pub struct AuthLayer {
    jwt_manager: JwtManager,
    mode: AuthMode,
}

impl AuthLayer {
    /// Authentication that rejects unauthenticated requests.
    pub fn required(jwt_manager: JwtManager) -> Self {
        Self {
            jwt_manager,
            mode: AuthMode::Required,
        }
    }

    /// Authentication that never blocks.
    pub fn optional(jwt_manager: JwtManager) -> Self {
        Self {
            jwt_manager,
            mode: AuthMode::Optional,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            jwt_manager: self.jwt_manager.clone(),
            mode: self.mode,
        }
    }
}

// =============================================================================
// AuthMiddleware
// =============================================================================

/// Middleware for bearer-token authentication.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    jwt_manager: JwtManager,
    mode: AuthMode,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let outcome = authenticate(&self.jwt_manager, req.headers());
        let mode = self.mode;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match outcome {
                Ok(claims) => {
                    let mut ctx = AuthContext::from_claims(&claims);
                    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
                        ctx = ctx.with_client_ip(addr.ip());
                    }
                    req.extensions_mut().insert(ctx);
                    inner.call(req).await
                }
                Err(err) if mode == AuthMode::Required => {
                    tracing::debug!(
                        code = err.error_code(),
                        path = %req.uri().path(),
                        "Authentication failed"
                    );
                    Ok(err.into_response())
                }
                Err(_) => inner.call(req).await,
            }
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Runs the authentication steps against a header map.
///
/// Missing header, malformed header and token validation each fail with
/// their own code.
pub fn authenticate(jwt_manager: &JwtManager, headers: &HeaderMap) -> Result<AccessClaims, ApiError> {
    let token = extract_bearer_token(headers)?;
    jwt_manager.validate_access_token(token).map_err(|e| {
        tracing::debug!(reason = e.code(), "Access token rejected");
        ApiError::from(e)
    })
}

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers.get(header::AUTHORIZATION).ok_or_else(|| {
        ApiError::unauthorized(ErrorCode::MissingToken, "Authorization header is required")
    })?;

    let invalid_format = || {
        ApiError::unauthorized(
            ErrorCode::InvalidFormat,
            "Authorization header must be 'Bearer <token>'",
        )
    };

    let value = value.to_str().map_err(|_| invalid_format())?;
    let (scheme, token) = value.split_once(' ').ok_or_else(invalid_format)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() || token.contains(' ') {
        return Err(invalid_format());
    }
    Ok(token)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;

    use axum::http::{HeaderValue, StatusCode};
    use chrono::Utc;
    use quill_core::{ManualClock, Role, User};
    use tower::ServiceExt;

    use crate::auth::JwtConfig;

    fn manager() -> (JwtManager, ManualClock) {
        let clock = ManualClock::starting_now();
        let manager = JwtManager::new(
            JwtConfig::new("middleware-test-secret-long-enough-for-hs256"),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (manager, clock)
    }

    fn token_for(manager: &JwtManager, role: Role) -> String {
        let now = Utc::now();
        let user = User {
            id: 11,
            username: "alice".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        manager.issue_access_token(&user).unwrap().token
    }

    async fn call(layer: AuthLayer, authorization: Option<&str>) -> (StatusCode, String) {
        let service = layer.layer(tower::service_fn(|req: Request<Body>| async move {
            let body = match req.extensions().get::<AuthContext>() {
                Some(ctx) => format!("user:{}:{}", ctx.user_id, ctx.role),
                None => "anonymous".to_string(),
            };
            Ok::<_, Infallible>(Response::new(Body::from(body)))
        }));

        let mut req = Request::builder().uri("/auth/me");
        if let Some(value) = authorization {
            req = req.header(header::AUTHORIZATION, value);
        }
        let response = service.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        let err = extract_bearer_token(&headers).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingToken);

        for bad in ["Basic abc", "Bearer", "Bearer ", "Bearer a b", "token"] {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(bad));
            let err = extract_bearer_token(&headers).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidFormat, "{bad}");
        }

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer mytoken123"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "mytoken123");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer mytoken123"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "mytoken123");
    }

    #[tokio::test]
    async fn test_required_accepts_valid_token() {
        let (manager, _) = manager();
        let token = token_for(&manager, Role::Author);

        let (status, body) = call(AuthLayer::required(manager), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user:11:author");
    }

    #[tokio::test]
    async fn test_required_rejection_codes() {
        let (manager, clock) = manager();
        let token = token_for(&manager, Role::Author);

        let (status, body) = call(AuthLayer::required(manager.clone()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("ERR_AUTH_MISSING_TOKEN"));

        let (_, body) = call(AuthLayer::required(manager.clone()), Some("Token abc")).await;
        assert!(body.contains("ERR_AUTH_INVALID_FORMAT"));

        let (_, body) = call(AuthLayer::required(manager.clone()), Some("Bearer not.a.jwt")).await;
        assert!(body.contains("ERR_AUTH_TOKEN_INVALID"));

        clock.advance(chrono::Duration::minutes(16));
        let (status, body) = call(AuthLayer::required(manager), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("ERR_AUTH_TOKEN_EXPIRED"));
    }

    #[tokio::test]
    async fn test_optional_never_blocks() {
        let (manager, _) = manager();
        let token = token_for(&manager, Role::Admin);

        let (status, body) = call(AuthLayer::optional(manager.clone()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, body) = call(AuthLayer::optional(manager.clone()), Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let (status, body) = call(AuthLayer::optional(manager), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user:11:admin");
    }
}
