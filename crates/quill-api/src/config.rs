// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quill_core::PasswordConfig;

use crate::auth::JwtConfig;
use crate::middleware::RateLimitConfig;

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration errors. Raised at startup, never at request time.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No signing secret was configured.
    #[error("JWT secret is not configured (set jwt.secret or QUILL_JWT_SECRET)")]
    MissingSecret,

    /// The signing secret is too short for a non-development environment.
    #[error("JWT secret is {actual} bytes; at least {required} are required outside development")]
    WeakSecret {
        /// Configured length.
        actual: usize,
        /// Required length.
        required: usize,
    },

    /// Any other invalid setting.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an invalid-setting error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development. Relaxed secret policy.
    #[default]
    Development,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns the environment name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Returns `true` for development.
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::invalid(format!("unknown environment '{}'", other))),
        }
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

/// Configuration for the API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Server host address.
    pub host: IpAddr,
    /// Server port.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Token configuration.
    pub jwt: JwtConfig,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Password hashing configuration.
    pub password: PasswordConfig,
    /// Request timeout.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Deadline for every individual store call.
    #[serde(with = "duration_secs")]
    pub store_timeout: Duration,
    /// Graceful shutdown timeout.
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            cors: CorsConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            password: PasswordConfig::default(),
            request_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Sets the environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the host address.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the JWT configuration.
    pub fn with_jwt(mut self, jwt: JwtConfig) -> Self {
        self.jwt = jwt;
        self
    }

    /// Sets the rate limit configuration.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Sets the password configuration.
    pub fn with_password(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    /// Sets the store deadline.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Applies the secret policy, then validates everything.
    pub fn prepare(mut self) -> Result<Self, ConfigError> {
        self.jwt.enforce_secret_policy(self.environment)?;
        self.validate()?;
        Ok(self)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;
        self.rate_limit.validate()?;
        self.password
            .validate()
            .map_err(|e| ConfigError::invalid(format!("password: {}", e)))?;
        self.cors.validate()?;

        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid("request_timeout must be greater than zero"));
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::invalid("store_timeout must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// CorsConfig
// =============================================================================

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins.
    pub allowed_origins: Vec<String>,
    /// Allowed methods.
    pub allowed_methods: Vec<String>,
    /// Allowed headers.
    pub allowed_headers: Vec<String>,
    /// Whether to allow credentials.
    pub allow_credentials: bool,
    /// Max age for preflight cache (seconds).
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: ["Content-Type", "Authorization", "X-Request-ID"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_credentials: false,
            max_age: 3600,
        }
    }
}

impl CorsConfig {
    /// Creates a restrictive CORS configuration for production.
    pub fn strict(origins: Vec<String>) -> Self {
        Self {
            allowed_origins: origins,
            allow_credentials: true,
            ..Self::default()
        }
    }

    /// Returns `true` if any origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allow_credentials && self.allows_any_origin() {
            return Err(ConfigError::invalid(
                "cors.allow_credentials cannot be combined with a wildcard origin",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Duration serialization (seconds)
// =============================================================================

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.jwt.access_ttl_secs, 900);
        assert_eq!(config.jwt.refresh_ttl_secs, 604_800);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig::default().with_port(9000);
        assert_eq!(config.socket_addr().port(), 9000);
    }

    #[test]
    fn test_prepare_in_development_generates_secret() {
        let config = ApiConfig::default().prepare().unwrap();
        assert!(!config.jwt.secret.is_empty());
    }

    #[test]
    fn test_prepare_in_production_requires_secret() {
        let result = ApiConfig::default()
            .with_environment(Environment::Production)
            .prepare();
        assert!(matches!(result, Err(ConfigError::MissingSecret)));

        let config = ApiConfig::default()
            .with_environment(Environment::Production)
            .with_jwt(JwtConfig::new("a".repeat(32)))
            .prepare()
            .unwrap();
        assert_eq!(config.jwt.secret.len(), 32);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_cors_wildcard_with_credentials_rejected() {
        let mut cors = CorsConfig::default();
        assert!(cors.validate().is_ok());
        cors.allow_credentials = true;
        assert!(cors.validate().is_err());
        assert!(CorsConfig::strict(vec!["https://quill.dev".into()]).validate().is_ok());
    }

    #[test]
    fn test_deserialize_durations() {
        let json = serde_json::json!({ "store_timeout": 0.25, "environment": "production" });
        let config: ApiConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.environment, Environment::Production);
    }
}
