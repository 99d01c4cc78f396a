// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use quill_core::{
    Clock, MemoryRefreshTokenStore, MemoryUserStore, PasswordHasher, RefreshTokenStore,
    SystemClock, UserStore,
};

use crate::auth::JwtManager;
use crate::config::{ApiConfig, ConfigError};
use crate::middleware::RateLimiterState;
use crate::service::AuthService;

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Token manager, shared with the auth middleware.
    pub jwt_manager: JwtManager,
    /// Session lifecycle service.
    pub auth: Arc<AuthService>,
    /// Rate limiter registry.
    pub rate_limiter: Arc<RateLimiterState>,
}

impl AppState {
    /// Creates a new app state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Returns the token manager.
    pub fn jwt(&self) -> &JwtManager {
        &self.jwt_manager
    }

    /// Returns the auth service.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("rate_limited_keys", &self.rate_limiter.tracked_keys())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for constructing AppState.
///
/// Stores default to the in-memory implementations and the clock to
/// [`SystemClock`].
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<ApiConfig>,
    users: Option<Arc<dyn UserStore>>,
    tokens: Option<Arc<dyn RefreshTokenStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the user store.
    pub fn user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.users = Some(store);
        self
    }

    /// Sets the refresh token store.
    pub fn token_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the AppState.
    ///
    /// The configuration goes through [`ApiConfig::prepare`], so outside
    /// development a missing or short signing secret fails here.
    pub fn build(self) -> Result<AppState, ConfigError> {
        let config = self.config.unwrap_or_default().prepare()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let users = self
            .users
            .unwrap_or_else(|| Arc::new(MemoryUserStore::with_clock(clock.clone())));
        let tokens = self
            .tokens
            .unwrap_or_else(|| Arc::new(MemoryRefreshTokenStore::with_clock(clock.clone())));

        let jwt_manager = JwtManager::new(config.jwt.clone(), clock)?;
        let hasher = PasswordHasher::new(config.password.clone())
            .map_err(|e| ConfigError::invalid(format!("password: {}", e)))?;

        let auth = AuthService::new(
            users,
            tokens,
            jwt_manager.clone(),
            hasher,
            config.store_timeout,
        );
        let rate_limiter = Arc::new(RateLimiterState::new(config.rate_limit.clone()));

        Ok(AppState {
            config: Arc::new(config),
            jwt_manager,
            auth: Arc::new(auth),
            rate_limiter,
        })
    }
}

// =============================================================================
// FromRef implementations for extracting parts of state
// =============================================================================

impl axum::extract::FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ApiConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::config::Environment;
    use quill_core::{ManualClock, PasswordConfig};

    fn test_config() -> ApiConfig {
        ApiConfig::default()
            .with_jwt(JwtConfig::new("test-secret-key-that-is-long-enough-for-testing"))
            .with_password(PasswordConfig::minimal_cost())
    }

    #[test]
    fn test_app_state_builder() {
        let state = AppState::builder().config(test_config()).build().unwrap();
        assert_eq!(state.jwt().access_ttl_secs(), 900);
        assert_eq!(state.rate_limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_builder_applies_secret_policy() {
        let production = || {
            ApiConfig::default()
                .with_environment(Environment::Production)
                .with_password(PasswordConfig::minimal_cost())
        };

        let err = AppState::builder().config(production()).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret));

        let err = AppState::builder()
            .config(production().with_jwt(JwtConfig::new("short")))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret { actual: 5, required: 32 }));

        let state = AppState::builder()
            .config(ApiConfig::default().with_password(PasswordConfig::minimal_cost()))
            .build()
            .unwrap();
        assert!(state.config.jwt.secret.len() >= 32);
    }

    #[test]
    fn test_injected_clock_drives_tokens() {
        let clock = ManualClock::starting_now();
        let state = AppState::builder()
            .config(test_config())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        assert_eq!(state.jwt().clock().now(), clock.now());
    }
}
