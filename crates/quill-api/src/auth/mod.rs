// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication module.
//!
//! This module provides:
//! - Access-token claims, signing and validation
//! - Refresh-token value generation
//! - The per-request authentication context

mod claims;
mod context;
mod error;
mod jwt;

pub use claims::{ACCESS_TOKEN_TYPE, AccessClaims};
pub use context::AuthContext;
pub use error::TokenError;
pub use jwt::{IssuedAccessToken, JwtConfig, JwtManager, MIN_REFRESH_TOKEN_BYTES, random_bytes, random_hex};
pub use quill_core::Role;
