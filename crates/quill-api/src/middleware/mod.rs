// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Middleware implementations for the API server.
//!
//! - [`AuthLayer`]: bearer-token authentication, required or optional
//! - [`RbacLayer`]: role gate on the authenticated context
//! - [`OwnerOrAdminLayer`]: resource-ownership gate
//! - [`RateLimitLayer`]: tiered per-client rate limiting

mod auth;
mod ownership;
pub mod rate_limit;
mod rbac;

pub use auth::{AuthLayer, AuthMiddleware, AuthMode, authenticate};
pub use ownership::{
    OwnerOrAdminLayer, OwnerOrAdminMiddleware, OwnerResolver, OwnershipError, PathOwnerResolver,
};
pub use rate_limit::{
    EndpointClass, RateLimitConfig, RateLimitDecision, RateLimitLayer, RateLimitMiddleware,
    RateLimiterState,
};
pub use rbac::{RbacLayer, RbacMiddleware};
