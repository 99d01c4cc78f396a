// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Access-token signing and validation, and refresh-token generation.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use quill_core::{Clock, User};

use super::{AccessClaims, TokenError};
use crate::config::{ConfigError, Environment};

/// Smallest accepted refresh-token entropy in bytes.
pub const MIN_REFRESH_TOKEN_BYTES: usize = 32;

/// Entropy of a generated development secret.
const EPHEMERAL_SECRET_BYTES: usize = 48;

// =============================================================================
// JwtConfig
// =============================================================================

/// Token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC signing secret.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Token issuer, checked on validation.
    pub issuer: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Signing algorithm. Only HMAC algorithms are accepted.
    #[serde(with = "algorithm_serde")]
    pub algorithm: Algorithm,
    /// Clock skew tolerance on expiry, in seconds.
    pub leeway_secs: u64,
    /// Minimum secret length outside development.
    pub min_secret_len: usize,
    /// Random bytes per refresh token.
    pub refresh_token_bytes: usize,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set by user
            issuer: "quill".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 86_400,
            algorithm: Algorithm::HS256,
            leeway_secs: 0,
            min_secret_len: 32,
            refresh_token_bytes: MIN_REFRESH_TOKEN_BYTES,
        }
    }
}

impl JwtConfig {
    /// Creates a new configuration with the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the access token lifetime.
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Sets the refresh token lifetime.
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Sets the signing algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Validates the shape of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if !is_hmac(self.algorithm) {
            return Err(ConfigError::invalid(format!(
                "jwt.algorithm {:?} is not supported; use HS256, HS384 or HS512",
                self.algorithm
            )));
        }
        if self.access_ttl_secs <= 0 || self.refresh_ttl_secs <= 0 {
            return Err(ConfigError::invalid("jwt token lifetimes must be positive"));
        }
        if self.refresh_token_bytes < MIN_REFRESH_TOKEN_BYTES {
            return Err(ConfigError::invalid(format!(
                "jwt.refresh_token_bytes must be at least {}",
                MIN_REFRESH_TOKEN_BYTES
            )));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::invalid("jwt.issuer must not be empty"));
        }
        Ok(())
    }

    /// Applies the secret policy for `environment`.
    ///
    /// In development a missing secret is replaced by a random one that
    /// lives only as long as the process. Everywhere else a missing or
    /// short secret is an error.
    pub fn enforce_secret_policy(&mut self, environment: Environment) -> Result<(), ConfigError> {
        if environment.is_development() {
            if self.secret.is_empty() {
                self.secret = random_hex(EPHEMERAL_SECRET_BYTES);
                tracing::warn!(
                    "No JWT secret configured; generated an ephemeral development secret. \
                     Tokens will not survive a restart."
                );
            } else if self.secret.len() < self.min_secret_len {
                tracing::warn!(
                    length = self.secret.len(),
                    required = self.min_secret_len,
                    "JWT secret is shorter than recommended"
                );
            }
            return Ok(());
        }

        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.secret.len() < self.min_secret_len {
            return Err(ConfigError::WeakSecret {
                actual: self.secret.len(),
                required: self.min_secret_len,
            });
        }
        Ok(())
    }
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Hex-encodes `len` bytes from the OS random source.
pub fn random_hex(len: usize) -> String {
    hex::encode(random_bytes(len))
}

/// Returns `len` bytes from the OS random source.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

// =============================================================================
// IssuedAccessToken
// =============================================================================

/// A freshly signed access token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// Compact JWT.
    pub token: String,
    /// The signed claims.
    pub claims: AccessClaims,
}

// =============================================================================
// JwtManager
// =============================================================================

/// Signs and validates access tokens and mints refresh-token values.
///
/// Validation is a pure function of the token, the secret and the clock.
/// Steps run in a fixed order: signature and algorithm, claim decoding,
/// `type == "access"`, then `now <= exp`. A token failing an earlier step
/// is never reported with a later step's error.
#[derive(Clone)]
pub struct JwtManager {
    config: Arc<JwtConfig>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    clock: Arc<dyn Clock>,
}

impl JwtManager {
    /// Creates a new JWT manager with the given configuration.
    pub fn new(config: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Expiry is checked by hand after the type check, against the
        // injected clock.
        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Ok(Self {
            config: Arc::new(config),
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
            clock,
        })
    }

    /// Signs arbitrary claims.
    pub fn create_token(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        let header = Header::new(self.config.algorithm);
        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issues an access token for `user`.
    pub fn issue_access_token(&self, user: &User) -> Result<IssuedAccessToken, TokenError> {
        let claims = AccessClaims::for_user(
            user,
            &self.config.issuer,
            self.clock.now(),
            self.config.access_ttl_secs,
        );
        let token = self.create_token(&claims)?;
        Ok(IssuedAccessToken { token, claims })
    }

    /// Validates an access token and returns its claims.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?.claims;

        if !claims.is_access() {
            return Err(TokenError::WrongType);
        }

        let now = self.clock.now().timestamp();
        if now > claims.exp.saturating_add(self.config.leeway_secs as i64) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Generates a new opaque refresh-token value.
    pub fn generate_refresh_token(&self) -> String {
        random_hex(self.config.refresh_token_bytes)
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl_secs
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.config.refresh_ttl_secs)
    }

    /// The clock used for issuance and validation.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.config.issuer)
            .field("algorithm", &self.config.algorithm)
            .field("access_ttl_secs", &self.config.access_ttl_secs)
            .finish()
    }
}

// =============================================================================
// Algorithm Serialization
// =============================================================================

mod algorithm_serde {
    use jsonwebtoken::Algorithm;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(algorithm: &Algorithm, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match algorithm {
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
            _ => "HS256",
        };
        s.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Algorithm, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            _ => Err(serde::de::Error::custom(format!(
                "unsupported algorithm: {} (expected HS256, HS384 or HS512)",
                s
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quill_core::{ManualClock, Role};

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: 42,
            username: "alice".into(),
            email: "alice@example.com".into(),
            name: "Alice".into(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn manager_with_clock() -> (JwtManager, ManualClock) {
        let clock = ManualClock::starting_now();
        let manager = JwtManager::new(JwtConfig::new(SECRET), Arc::new(clock.clone())).unwrap();
        (manager, clock)
    }

    #[test]
    fn test_round_trip() {
        let (manager, _) = manager_with_clock();
        for role in Role::ALL {
            let user = user(role);
            let issued = manager.issue_access_token(&user).unwrap();
            let claims = manager.validate_access_token(&issued.token).unwrap();

            assert_eq!(claims.user_id, user.id);
            assert_eq!(claims.email, user.email);
            assert_eq!(claims.username, user.username);
            assert_eq!(claims.role, role);
            assert_eq!(claims, issued.claims);
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let (manager, clock) = manager_with_clock();
        let issued = manager.issue_access_token(&user(Role::Author)).unwrap();

        clock.advance(chrono::Duration::seconds(900));
        assert!(manager.validate_access_token(&issued.token).is_ok());

        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(
            manager.validate_access_token(&issued.token).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_wrong_type_checked_before_expiry() {
        let (manager, clock) = manager_with_clock();
        let mut claims = manager.issue_access_token(&user(Role::Author)).unwrap().claims;
        claims.token_type = "refresh".into();
        let token = manager.create_token(&claims).unwrap();

        assert_eq!(manager.validate_access_token(&token).unwrap_err(), TokenError::WrongType);

        clock.advance(chrono::Duration::days(1));
        assert_eq!(manager.validate_access_token(&token).unwrap_err(), TokenError::WrongType);
    }

    #[test]
    fn test_wrong_secret() {
        let (manager, clock) = manager_with_clock();
        let other = JwtManager::new(
            JwtConfig::new("another-secret-that-is-long-enough-too"),
            Arc::new(clock),
        )
        .unwrap();

        let token = other.issue_access_token(&user(Role::Admin)).unwrap().token;
        assert_eq!(
            manager.validate_access_token(&token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_and_tampered_reports_invalid() {
        let (manager, clock) = manager_with_clock();
        let author = manager.issue_access_token(&user(Role::Author)).unwrap().token;
        let admin = manager.issue_access_token(&user(Role::Admin)).unwrap().token;
        clock.advance(chrono::Duration::days(2));

        // Admin payload under the author's signature.
        let author_parts: Vec<&str> = author.split('.').collect();
        let admin_parts: Vec<&str> = admin.split('.').collect();
        let tampered = format!("{}.{}.{}", author_parts[0], admin_parts[1], author_parts[2]);

        assert_eq!(
            manager.validate_access_token(&tampered).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let (manager, clock) = manager_with_clock();
        let hs512 = JwtManager::new(
            JwtConfig::new(SECRET).with_algorithm(Algorithm::HS512),
            Arc::new(clock),
        )
        .unwrap();

        let token = hs512.issue_access_token(&user(Role::Author)).unwrap().token;
        assert_eq!(
            manager.validate_access_token(&token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let (manager, clock) = manager_with_clock();
        let foreign = JwtManager::new(JwtConfig::new(SECRET).with_issuer("elsewhere"), Arc::new(clock)).unwrap();

        let token = foreign.issue_access_token(&user(Role::Author)).unwrap().token;
        assert_eq!(
            manager.validate_access_token(&token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (manager, _) = manager_with_clock();
        assert_eq!(manager.validate_access_token("invalid.token.here").unwrap_err(), TokenError::Malformed);
        assert_eq!(manager.validate_access_token("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_refresh_token_entropy() {
        let (manager, _) = manager_with_clock();
        let a = manager.generate_refresh_token();
        let b = manager.generate_refresh_token();

        assert_eq!(a.len(), MIN_REFRESH_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(JwtConfig::default().validate(), Err(ConfigError::MissingSecret)));
        assert!(JwtConfig::new(SECRET).with_algorithm(Algorithm::RS256).validate().is_err());

        let mut config = JwtConfig::new(SECRET);
        config.refresh_token_bytes = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_policy() {
        let mut config = JwtConfig::default();
        config.enforce_secret_policy(Environment::Development).unwrap();
        assert!(config.secret.len() >= 32);

        let mut config = JwtConfig::default();
        assert!(matches!(
            config.enforce_secret_policy(Environment::Production),
            Err(ConfigError::MissingSecret)
        ));

        let mut config = JwtConfig::new("short");
        assert!(matches!(
            config.enforce_secret_policy(Environment::Staging),
            Err(ConfigError::WeakSecret { actual: 5, required: 32 })
        ));

        let mut config = JwtConfig::new("short");
        config.enforce_secret_policy(Environment::Development).unwrap();
        assert_eq!(config.secret, "short");
    }

    #[test]
    fn test_algorithm_serde_rejects_asymmetric() {
        let json = serde_json::json!({ "algorithm": "RS256" });
        assert!(serde_json::from_value::<JwtConfig>(json).is_err());

        let json = serde_json::json!({ "algorithm": "HS384" });
        let config: JwtConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.algorithm, Algorithm::HS384);
    }
}
