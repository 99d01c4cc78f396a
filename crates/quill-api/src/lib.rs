// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # quill-api
//!
//! HTTP surface of the Quill auth service.
//!
//! This crate provides token issuance and validation, the session lifecycle
//! service, the authentication, role, ownership and rate-limit middleware,
//! and the axum server wiring them together.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_api::{ApiConfig, ApiServer};
//!
//! let config = ApiConfig::default().prepare()?;
//! let server = ApiServer::from_config(config)?;
//! server.run_with_shutdown(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod service;
pub mod state;

pub use auth::{AccessClaims, AuthContext, JwtConfig, JwtManager, TokenError};
pub use config::{ApiConfig, ConfigError, CorsConfig, Environment};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{
    AuthLayer, OwnerOrAdminLayer, OwnerResolver, RateLimitConfig, RateLimitLayer, RbacLayer,
};
pub use server::{ApiServer, ServeError, build_router};
pub use service::{AuthError, AuthService, Registration, TokenPair};
pub use state::{AppState, AppStateBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
