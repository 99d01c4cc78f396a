// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # quill-core
//!
//! Domain model and persistence abstractions for the Quill auth service.
//!
//! This crate provides the pieces the session lifecycle is built on:
//!
//! - **Model**: `User`, `Role`, `RefreshToken` and their creation inputs
//! - **Store**: async repository traits plus in-memory implementations
//! - **Password**: argon2id hashing offloaded to a bounded blocking pool
//! - **Clock**: an injectable time source so expiry logic is testable
//! - **Error**: store and password errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_core::model::{NewUser, Role};
//! use quill_core::store::{MemoryUserStore, UserStore};
//!
//! let users = MemoryUserStore::new();
//! let user = users
//!     .create(NewUser::new("alice", "alice@example.com", "Alice", hash, Role::Author))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod clock;
pub mod error;
pub mod model;
pub mod password;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PasswordError, StoreError, StoreResult};
pub use model::{NewRefreshToken, NewUser, RefreshToken, Role, User, UserId};
pub use password::{PasswordConfig, PasswordHasher};
pub use store::{MemoryRefreshTokenStore, MemoryUserStore, RefreshTokenStore, UserStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
