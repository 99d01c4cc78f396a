// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised by the stores and the password hasher.
//!
//! ```
//! use quill_core::error::StoreError;
//! use std::time::Duration;
//!
//! let error = StoreError::timeout("find_by_token", Duration::from_secs(2));
//! assert!(error.is_timeout());
//! ```

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// StoreError
// =============================================================================

/// Errors raised by user and refresh-token stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind ("user", "refresh_token").
        entity: &'static str,
        /// Lookup key rendered for logs.
        key: String,
    },

    /// A unique constraint was violated.
    #[error("{entity} with duplicate {field}")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// The field that collided.
        field: &'static str,
    },

    /// The store did not answer within the configured deadline.
    #[error("store operation '{operation}' timed out after {after:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The backend failed.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Creates a unique-constraint error.
    pub fn conflict(entity: &'static str, field: &'static str) -> Self {
        Self::Conflict { entity, field }
    }

    /// Creates a deadline error.
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns `true` if the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the conflicting field, if this is a conflict.
    pub fn conflict_field(&self) -> Option<&'static str> {
        match self {
            Self::Conflict { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// PasswordError
// =============================================================================

/// Errors raised by the password hasher.
///
/// A wrong password is never an error; verification returns `Ok(false)`.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    /// The argon2 parameters are invalid.
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// The underlying hash computation failed.
    #[error("hashing failed: {0}")]
    Hashing(String),

    /// The blocking worker pool is closed or the job panicked.
    #[error("password worker unavailable: {0}")]
    WorkerUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_helpers() {
        let err = StoreError::conflict("user", "email");
        assert_eq!(err.conflict_field(), Some("email"));
        assert!(!err.is_timeout());

        let err = StoreError::timeout("create", Duration::from_millis(10));
        assert!(err.is_timeout());
        assert_eq!(err.conflict_field(), None);
    }
}
