// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle service.

mod auth;
mod error;
pub mod validation;

pub use auth::{AuthService, BEARER, Registration, TokenPair};
pub use error::{AuthError, AuthResult};
