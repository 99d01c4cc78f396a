// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Resource-ownership middleware.
//!
//! Admins pass unconditionally. Everyone else must be the owner reported by
//! an [`OwnerResolver`]. A resolver failure denies the request with 500.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, Path},
    http::{Request, request::Parts},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tower::{Layer, Service};

use quill_core::UserId;

use crate::auth::AuthContext;
use crate::error::{ApiError, ErrorCode};

// =============================================================================
// OwnerResolver
// =============================================================================

/// Failure to determine the owner of a resource.
#[derive(Debug, Clone, Error)]
pub enum OwnershipError {
    /// The request does not identify a resource.
    #[error("resource identifier missing: {0}")]
    MissingIdentifier(String),

    /// The resource identifier could not be parsed.
    #[error("invalid resource identifier: {0}")]
    InvalidIdentifier(String),

    /// The owner lookup itself failed.
    #[error("owner lookup failed: {0}")]
    Lookup(String),
}

/// Resolves the owning user of the resource a request targets.
///
/// Receives the request head only; the body is reattached untouched.
#[async_trait]
pub trait OwnerResolver: Send + Sync + 'static {
    /// Returns the owner id.
    async fn resolve_owner(&self, parts: &mut Parts) -> Result<UserId, OwnershipError>;
}

/// Treats a path parameter as the owning user id.
///
/// Suits routes such as `/users/{id}` where the resource is the user.
#[derive(Debug, Clone)]
pub struct PathOwnerResolver {
    param: String,
}

impl PathOwnerResolver {
    /// Creates a resolver reading the named path parameter.
    pub fn new(param: impl Into<String>) -> Self {
        Self { param: param.into() }
    }
}

#[async_trait]
impl OwnerResolver for PathOwnerResolver {
    async fn resolve_owner(&self, parts: &mut Parts) -> Result<UserId, OwnershipError> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, &())
            .await
            .map_err(|e| OwnershipError::MissingIdentifier(e.body_text()))?;

        let raw = params
            .get(&self.param)
            .ok_or_else(|| OwnershipError::MissingIdentifier(self.param.clone()))?;

        raw.parse::<UserId>()
            .map_err(|_| OwnershipError::InvalidIdentifier(format!("{}={}", self.param, raw)))
    }
}

// =============================================================================
// OwnerOrAdminLayer
// =============================================================================

/// Layer allowing admins and resource owners.
///
/// Must run after [`AuthLayer`](super::AuthLayer).
#[derive(Clone)]
pub struct OwnerOrAdminLayer {
    resolver: Arc<dyn OwnerResolver>,
}

impl OwnerOrAdminLayer {
    /// Creates a layer with a resolver.
    pub fn new<R: OwnerResolver>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Owner taken from a path parameter.
    pub fn path_param(param: impl Into<String>) -> Self {
        Self::new(PathOwnerResolver::new(param))
    }
}

impl fmt::Debug for OwnerOrAdminLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerOrAdminLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for OwnerOrAdminLayer {
    type Service = OwnerOrAdminMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OwnerOrAdminMiddleware {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

// =============================================================================
// OwnerOrAdminMiddleware
// =============================================================================

/// Middleware enforcing ownership.
#[derive(Clone)]
pub struct OwnerOrAdminMiddleware<S> {
    inner: S,
    resolver: Arc<dyn OwnerResolver>,
}

impl<S> Service<Request<Body>> for OwnerOrAdminMiddleware<S>
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
        let resolver = self.resolver.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(ctx) = req.extensions().get::<AuthContext>().cloned() else {
                tracing::warn!(path = %req.uri().path(), "No auth context found, denying access");
                return Ok(ApiError::unauthorized(
                    ErrorCode::MissingToken,
                    "Authentication required",
                )
                .into_response());
            };

            if ctx.is_admin() {
                return inner.call(req).await;
            }

            let (mut parts, body) = req.into_parts();
            let owner = resolver.resolve_owner(&mut parts).await;
            let req = Request::from_parts(parts, body);

            match owner {
                Ok(owner_id) if ctx.is_user(owner_id) => inner.call(req).await,
                Ok(owner_id) => {
                    tracing::warn!(
                        user_id = ctx.user_id,
                        owner_id,
                        path = %req.uri().path(),
                        "Ownership check denied"
                    );
                    Ok(ApiError::forbidden(
                        ErrorCode::AccessDenied,
                        "You do not have access to this resource",
                    )
                    .into_response())
                }
                Err(e) => {
                    tracing::error!(
                        user_id = ctx.user_id,
                        path = %req.uri().path(),
                        error = %e,
                        "Ownership could not be determined"
                    );
                    Ok(ApiError::ownership_check(e.to_string()).into_response())
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
