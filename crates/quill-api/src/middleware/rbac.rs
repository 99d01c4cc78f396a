// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! RBAC (Role-Based Access Control) middleware.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};

use quill_core::Role;

use crate::auth::AuthContext;
use crate::error::{ApiError, ErrorCode};

// =============================================================================
// RbacLayer
// =============================================================================

/// Layer for role-based access control.
///
/// Runs after [`AuthLayer`](super::AuthLayer) and checks the role carried by
/// the [`AuthContext`]. A request without a context is rejected with 401.
#[derive(Debug, Clone, Copy)]
pub struct RbacLayer {
    required: Role,
}

impl RbacLayer {
    /// Creates a layer requiring a role.
    pub fn require(role: Role) -> Self {
        Self { required: role }
    }

    /// Creates a layer requiring the admin role.
    pub fn admin_only() -> Self {
        Self::require(Role::Admin)
    }

    /// Returns the required role.
    pub fn required_role(&self) -> Role {
        self.required
    }
}

impl<S> Layer<S> for RbacLayer {
    type Service = RbacMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RbacMiddleware {
            inner,
            required: self.required,
        }
    }
}

// =============================================================================
// RbacMiddleware
// =============================================================================

/// Middleware for RBAC enforcement.
#[derive(Clone)]
pub struct RbacMiddleware<S> {
    inner: S,
    required: Role,
}

impl<S> Service<Request<Body>> for RbacMiddleware<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let required = self.required;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(ctx) = req.extensions().get::<AuthContext>() else {
                tracing::warn!(path = %req.uri().path(), "No auth context found, denying access");
                return Ok(ApiError::unauthorized(
                    ErrorCode::MissingToken,
                    "Authentication required",
                )
                .into_response());
            };

            if ctx.role == required {
                inner.call(req).await
            } else {
                tracing::warn!(
                    user_id = ctx.user_id,
                    role = %ctx.role,
                    required_role = %required,
                    path = %req.uri().path(),
                    "Role check denied"
                );
                Ok(ApiError::forbidden(
                    ErrorCode::InsufficientPermissions,
                    "Insufficient permissions",
                )
                .into_response())
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn mock_service() -> impl Service<Request<Body>, Response = Response, Error = Infallible, Future = impl Future<Output = Result<Response, Infallible>> + Send> + Clone + Send {
        tower::service_fn(|_req| async {
            Ok::<_, Infallible>(Response::new(Body::from("OK")))
        })
    }

    fn context(user_id: i64, role: Role) -> AuthContext {
        AuthContext {
            user_id,
            role,
            username: format!("user{user_id}"),
            email: format!("user{user_id}@example.com"),
            client_ip: None,
            request_id: Uuid::now_v7(),
        }
    }

    fn request(path: &str, ctx: Option<AuthContext>) -> Request<Body> {
        let mut req = Request::builder().uri(path).body(Body::empty()).unwrap();
        if let Some(ctx) = ctx {
            req.extensions_mut().insert(ctx);
        }
        req
    }

    #[tokio::test]
    async fn test_admin_only_role_gate() {
        let layer = RbacLayer::admin_only();

        for role in Role::ALL {
            for path in ["/admin/users/1/revoke-sessions", "/admin/anything", "/"] {
                let mut service = layer.layer(mock_service());
                let response = service
                    .ready()
                    .await
                    .unwrap()
                    .call(request(path, Some(context(7, role))))
                    .await
                    .unwrap();

                let expected = if role.is_admin() {
                    StatusCode::OK
                } else {
                    StatusCode::FORBIDDEN
                };
                assert_eq!(response.status(), expected, "{role} on {path}");
            }
        }
    }

    #[tokio::test]
    async fn test_forbidden_body_code() {
        let mut service = RbacLayer::admin_only().layer(mock_service());
        let response = service
            .ready()
            .await
            .unwrap()
            .call(request("/admin", Some(context(1, Role::Author))))
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "ERR_AUTH_INSUFFICIENT_PERMISSIONS");
    }

    #[tokio::test]
    async fn test_no_auth_context() {
        let mut service = RbacLayer::admin_only().layer(mock_service());
        let response = service
            .ready()
            .await
            .unwrap()
            .call(request("/admin", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_author() {
        let mut service = RbacLayer::require(Role::Author).layer(mock_service());
        let response = service
            .ready()
            .await
            .unwrap()
            .call(request("/", Some(context(1, Role::Author))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
