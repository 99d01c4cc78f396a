// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers for all endpoints.
//!
//! - [`health`]: liveness
//! - [`auth`]: registration, login, token rotation and logout
//! - [`users`]: profile lookup and administrative session revocation

mod auth;
mod health;
mod users;

pub use auth::*;
pub use health::*;
pub use users::*;
