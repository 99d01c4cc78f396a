// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Access-token validation errors.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use thiserror::Error;

/// Why an access token was rejected (or could not be minted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token is not a well-formed JWT or its claims do not decode.
    #[error("token is malformed")]
    Malformed,

    /// The token is valid but is not an access token.
    #[error("token is not an access token")]
    WrongType,

    /// The token is past its expiry.
    #[error("token has expired")]
    Expired,

    /// The signature, algorithm or issuer does not match.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Signing failed while issuing a token.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Machine-readable validator code.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "ERR_TOKEN_MALFORMED",
            TokenError::WrongType => "ERR_TOKEN_WRONG_TYPE",
            TokenError::Expired => "ERR_TOKEN_EXPIRED",
            TokenError::InvalidSignature => "ERR_TOKEN_INVALID_SIGNATURE",
            TokenError::Signing(_) => "ERR_TOKEN_SIGNING",
        }
    }

    /// Returns `true` only for expiry.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

impl From<JwtError> for TokenError {
    fn from(err: JwtError) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(TokenError::Malformed.code(), "ERR_TOKEN_MALFORMED");
        assert_eq!(TokenError::WrongType.code(), "ERR_TOKEN_WRONG_TYPE");
        assert_eq!(TokenError::Expired.code(), "ERR_TOKEN_EXPIRED");
        assert_eq!(TokenError::InvalidSignature.code(), "ERR_TOKEN_INVALID_SIGNATURE");
        assert!(TokenError::Expired.is_expired());
        assert!(!TokenError::Malformed.is_expired());
    }

    #[test]
    fn test_from_jwt_error() {
        let err: TokenError = JwtError::from(ErrorKind::InvalidSignature).into();
        assert_eq!(err, TokenError::InvalidSignature);

        let err: TokenError = JwtError::from(ErrorKind::InvalidAlgorithm).into();
        assert_eq!(err, TokenError::InvalidSignature);

        let err: TokenError = JwtError::from(ErrorKind::InvalidToken).into();
        assert_eq!(err, TokenError::Malformed);
    }
}
