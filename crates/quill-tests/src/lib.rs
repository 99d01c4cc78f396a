// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Quill Integration Tests
//!
//! End-to-end tests that drive the full router in-process, without sockets.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Users and configurations
//!   - `harness`: [`TestApp`](common::harness::TestApp), a router over
//!     in-memory stores and a manual clock
//!   - `mocks`: Store wrappers with injected latency
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p quill-tests
//! cargo test -p quill-tests --test integration_session
//! ```
//!
//! ## Test Suites
//!
//! - `integration_auth.rs`: registration, login, identity, role and ownership gates
//! - `integration_session.rs`: rotation, expiry, single use, revocation scope
//! - `integration_rate_limit.rs`: per-class limits and response hints
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use quill_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let app = TestApp::new();
//!     let session = app.register_and_login(&UserFixtures::alice()).await;
//!     let me = app.get("/auth/me", Some(&session.access_token)).await;
//!     me.assert_status(StatusCode::OK);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::init_test_logging;
    pub use axum::http::StatusCode;
    pub use serde_json::json;
}
