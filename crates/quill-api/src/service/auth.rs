// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The auth service: credentials, token pairs, rotation and revocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use quill_core::{
    NewRefreshToken, NewUser, PasswordHasher, RefreshTokenStore, Role, StoreError, StoreResult,
    User, UserId, UserStore,
};

use super::error::{AuthError, AuthResult};
use super::validation::{check_email, check_name, check_password, check_username};
use crate::auth::JwtManager;
use crate::error::ValidationErrors;

/// Token type reported alongside every pair.
pub const BEARER: &str = "Bearer";

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// Registration input.
#[derive(Clone)]
pub struct Registration {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Display name.
    pub name: String,
    /// Requested role; `author` when absent.
    pub role: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// An access/refresh pair handed to a client.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Opaque refresh token, already persisted.
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// The user the pair was issued to.
    pub user: User,
}

// =============================================================================
// AuthService
// =============================================================================

/// Credential verification, token issuance, rotation and revocation.
///
/// Every store call runs under the configured deadline; an elapsed
/// deadline surfaces as `StoreError::Timeout`.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    jwt: JwtManager,
    hasher: PasswordHasher,
    store_timeout: Duration,
}

impl AuthService {
    /// Creates a new auth service.
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        jwt: JwtManager,
        hasher: PasswordHasher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            jwt,
            hasher,
            store_timeout,
        }
    }

    /// Returns the token manager.
    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    fn now(&self) -> DateTime<Utc> {
        self.jwt.clock().now()
    }

    async fn deadline<T, F>(&self, operation: &'static str, call: F) -> AuthResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call exceeded its deadline"
                );
                Err(StoreError::timeout(operation, self.store_timeout).into())
            }
        }
    }

    async fn active_user(&self, id: UserId) -> AuthResult<User> {
        self.deadline("find_user_by_id", self.users.find_by_id(id))
            .await?
            .filter(User::is_active)
            .ok_or(AuthError::UserNotFound(id))
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Validates and creates a new user.
    pub async fn register(&self, input: Registration) -> AuthResult<User> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        let mut errors = ValidationErrors::new();
        check_username(&username, &mut errors);
        check_email(&email, &mut errors);
        check_password("password", &input.password, self.hasher.min_length(), &mut errors);
        check_name(&input.name, &mut errors);
        let role = match input.role.as_deref() {
            None => Role::Author,
            Some(raw) => Role::parse(raw).unwrap_or_else(|| {
                errors.add("role", "must be one of: admin, author");
                Role::Author
            }),
        };
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        if self
            .deadline("find_user_by_username", self.users.find_by_username(&username))
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }
        if self
            .deadline("find_user_by_email", self.users.find_by_email(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&input.password).await?;
        let new_user = NewUser::new(username, email, input.name.trim(), password_hash, role);

        // The store's unique constraints settle races between the checks
        // above and this insert.
        let user = match self.deadline("create_user", self.users.create(new_user)).await {
            Ok(user) => user,
            Err(AuthError::Store(err)) => {
                return Err(match err.conflict_field() {
                    Some("username") => AuthError::UsernameTaken,
                    Some("email") => AuthError::EmailTaken,
                    _ => AuthError::Store(err),
                });
            }
            Err(err) => return Err(err),
        };

        info!(user_id = user.id, username = %user.username, role = %user.role, "User registered");
        Ok(user)
    }

    /// Verifies credentials and issues a token pair.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let email = email.trim().to_lowercase();
        let found = self
            .deadline("find_user_by_email", self.users.find_by_email(&email))
            .await?
            .filter(User::is_active);

        let Some(user) = found else {
            self.hasher.verify_dummy(password).await?;
            warn!(reason = "unknown_account", "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            warn!(user_id = user.id, reason = "bad_password", "Login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.generate_token_pair(&user).await?;
        info!(user_id = user.id, role = %user.role, "User logged in");
        Ok(pair)
    }

    // =========================================================================
    // Token Issuance
    // =========================================================================

    /// Issues a new access token and a persisted refresh token for `user`.
    ///
    /// The refresh token is written before anything is returned; if the
    /// write fails no token leaves this function.
    pub async fn generate_token_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let access = self.jwt.issue_access_token(user)?;
        let refresh_token = self.jwt.generate_refresh_token();
        let expires_at = self.now() + self.jwt.refresh_ttl();

        self.deadline(
            "create_refresh_token",
            self.tokens.create(NewRefreshToken {
                user_id: user.id,
                token: refresh_token.clone(),
                expires_at,
            }),
        )
        .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            token_type: BEARER,
            expires_in: self.jwt.access_ttl_secs(),
            user: user.clone(),
        })
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    /// Checks a refresh token and returns its owner.
    pub async fn validate_refresh_token(&self, token: &str) -> AuthResult<UserId> {
        let row = self
            .deadline("find_refresh_token", self.tokens.find_by_token(token))
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;

        if row.revoked {
            return Err(AuthError::RefreshTokenRevoked);
        }
        if row.is_expired(self.now()) {
            return Err(AuthError::RefreshTokenExpired);
        }
        Ok(row.user_id)
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// The presented token is claimed (atomically revoked) before the new
    /// pair is minted, so of any number of concurrent calls with the same
    /// token at most one succeeds. If issuing fails after the claim, the
    /// caller has to log in again.
    pub async fn refresh_access_token(&self, token: &str) -> AuthResult<TokenPair> {
        let user_id = match self.validate_refresh_token(token).await {
            Ok(user_id) => user_id,
            Err(AuthError::RefreshTokenRevoked) => {
                warn!("Revoked refresh token presented");
                return Err(AuthError::RefreshTokenRevoked);
            }
            Err(err) => return Err(err),
        };

        let user = match self.active_user(user_id).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound(_)) => {
                warn!(user_id, "Refresh token owner is no longer active");
                return Err(AuthError::RefreshTokenNotFound);
            }
            Err(err) => return Err(err),
        };

        let claimed = self
            .deadline("claim_refresh_token", self.tokens.claim(token, self.now()))
            .await?;
        if !claimed {
            // Lost the claim: either a concurrent rotation or the token
            // expired since it was checked.
            let row = self
                .deadline("find_refresh_token", self.tokens.find_by_token(token))
                .await?;
            return Err(match row {
                Some(row) if row.revoked => {
                    warn!(user_id, "Refresh token replay rejected");
                    AuthError::RefreshTokenRevoked
                }
                Some(_) => AuthError::RefreshTokenExpired,
                None => AuthError::RefreshTokenNotFound,
            });
        }

        let pair = self.generate_token_pair(&user).await?;
        debug!(user_id, "Refresh token rotated");
        Ok(pair)
    }

    // =========================================================================
    // Revocation
    // =========================================================================

    /// Revokes one refresh token. Revoking twice is not an error.
    ///
    /// Returns `false` if the token was unknown.
    pub async fn revoke_refresh_token(&self, token: &str) -> AuthResult<bool> {
        self.deadline("revoke_refresh_token", self.tokens.revoke(token))
            .await
    }

    /// Revokes every refresh token of `user_id`.
    pub async fn revoke_all_user_tokens(&self, user_id: UserId) -> AuthResult<u64> {
        let revoked = self
            .deadline("revoke_all_refresh_tokens", self.tokens.revoke_all_for_user(user_id))
            .await?;
        info!(user_id, revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }

    /// Ends a session for the caller.
    ///
    /// A presented refresh token is revoked only if it belongs to the
    /// caller. Unknown tokens are ignored.
    pub async fn logout(&self, user_id: UserId, refresh_token: Option<&str>) -> AuthResult<()> {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            debug!(user_id, "Logout without refresh token");
            return Ok(());
        };

        match self
            .deadline("find_refresh_token", self.tokens.find_by_token(token))
            .await?
        {
            Some(row) if row.user_id != user_id => {
                warn!(user_id, owner_id = row.user_id, "Logout with a foreign refresh token refused");
                Err(AuthError::AccessDenied(
                    "Refresh token belongs to another user".to_string(),
                ))
            }
            Some(_) => {
                self.revoke_refresh_token(token).await?;
                info!(user_id, "User logged out");
                Ok(())
            }
            None => {
                debug!(user_id, "Logout with unknown refresh token");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Account
    // =========================================================================

    /// Fetches an active user.
    pub async fn get_user(&self, id: UserId) -> AuthResult<User> {
        self.active_user(id).await
    }

    /// Changes a password and revokes every session of the user.
    ///
    /// Returns the number of revoked refresh tokens.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<u64> {
        let user = self.active_user(user_id).await?;

        let mut errors = ValidationErrors::new();
        check_password("new_password", new_password, self.hasher.min_length(), &mut errors);
        if current_password == new_password {
            errors.add("new_password", "must differ from the current password");
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        if !self.hasher.verify(current_password, &user.password_hash).await? {
            warn!(user_id, reason = "bad_password", "Password change refused");
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hasher.hash(new_password).await?;
        self.deadline(
            "update_password_hash",
            self.users.update_password_hash(user_id, password_hash),
        )
        .await?;

        let revoked = self.revoke_all_user_tokens(user_id).await?;
        info!(user_id, revoked, "Password changed");
        Ok(revoked)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt", &self.jwt)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quill_core::{
        Clock, ManualClock, MemoryRefreshTokenStore, MemoryUserStore, PasswordConfig,
        RefreshToken,
    };

    use crate::auth::JwtConfig;

    struct Fixture {
        service: Arc<AuthService>,
        users: Arc<MemoryUserStore>,
        tokens: Arc<MemoryRefreshTokenStore>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::starting_now();
        let users = Arc::new(MemoryUserStore::with_clock(Arc::new(clock.clone())));
        let tokens = Arc::new(MemoryRefreshTokenStore::with_clock(Arc::new(clock.clone())));
        let jwt = JwtManager::new(
            JwtConfig::new("service-test-secret-that-is-long-enough"),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let hasher = PasswordHasher::new(PasswordConfig::minimal_cost()).unwrap();
        let service = AuthService::new(
            users.clone(),
            tokens.clone(),
            jwt,
            hasher,
            Duration::from_secs(2),
        );

        Fixture {
            service: Arc::new(service),
            users,
            tokens,
            clock,
        }
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.into(),
            email: email.into(),
            password: "s3cret-password".into(),
            name: "Test User".into(),
            role: None,
        }
    }

    async fn registered(f: &Fixture, username: &str) -> User {
        f.service
            .register(registration(username, &format!("{username}@example.com")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_defaults_to_author() {
        let f = fixture();
        let user = f
            .service
            .register(registration("alice", " Alice@Example.COM "))
            .await
            .unwrap();

        assert_eq!(user.role, Role::Author);
        assert_eq!(user.email, "alice@example.com");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_collects_field_errors() {
        let f = fixture();
        let input = Registration {
            username: "a!".into(),
            email: "nope".into(),
            password: "short".into(),
            name: "".into(),
            role: Some("superuser".into()),
        };

        let Err(AuthError::Validation(errors)) = f.service.register(input).await else {
            panic!("expected validation error");
        };
        for field in ["username", "email", "password", "name", "role"] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
        assert!(f.users.is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicates() {
        let f = fixture();
        registered(&f, "alice").await;

        let err = f
            .service
            .register(registration("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));

        let err = f
            .service
            .register(registration("alice2", "ALICE@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_login_issues_persisted_pair() {
        let f = fixture();
        let user = registered(&f, "alice").await;

        let pair = f.service.login("alice@example.com", "s3cret-password").await.unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.user.id, user.id);

        let claims = f.service.jwt().validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, Role::Author);

        let row = f.tokens.find_by_token(&pair.refresh_token).await.unwrap().unwrap();
        assert_eq!(row.user_id, user.id);
        assert_eq!(row.expires_at - f.clock.now(), chrono::Duration::days(7));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture();
        registered(&f, "alice").await;

        let wrong = f.service.login("alice@example.com", "wrong-password").await.unwrap_err();
        let unknown = f.service.login("nobody@example.com", "s3cret-password").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(f.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_login_refuses_deleted_user() {
        let f = fixture();
        let user = registered(&f, "alice").await;
        f.users.soft_delete(user.id);

        let err = f.service.login("alice@example.com", "s3cret-password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let f = fixture();
        registered(&f, "alice").await;
        let pair = f.service.login("alice@example.com", "s3cret-password").await.unwrap();

        let rotated = f.service.refresh_access_token(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let err = f.service.refresh_access_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenRevoked));

        f.service.refresh_access_token(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_has_one_winner() {
        let f = fixture();
        registered(&f, "alice").await;
        let pair = f.service.login("alice@example.com", "s3cret-password").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let token = pair.refresh_token.clone();
            handles.push(tokio::spawn(async move { service.refresh_access_token(&token).await }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(err) => assert!(matches!(err, AuthError::RefreshTokenRevoked)),
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn test_refresh_rejections() {
        let f = fixture();
        let user = registered(&f, "alice").await;
        let pair = f.service.login("alice@example.com", "s3cret-password").await.unwrap();

        let err = f.service.refresh_access_token("does-not-exist").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenNotFound));

        f.clock.advance(chrono::Duration::days(7));
        let err = f.service.refresh_access_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenExpired));

        f.clock.advance(chrono::Duration::days(-7));
        f.users.soft_delete(user.id);
        let err = f.service.refresh_access_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenNotFound));
    }

    /// Token store whose clock passes the token's expiry just before a claim.
    #[derive(Debug)]
    struct ExpiresBeforeClaim {
        inner: Arc<MemoryRefreshTokenStore>,
        clock: ManualClock,
    }

    #[async_trait]
    impl RefreshTokenStore for ExpiresBeforeClaim {
        async fn create(&self, token: NewRefreshToken) -> StoreResult<RefreshToken> {
            self.inner.create(token).await
        }
        async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
            self.inner.find_by_token(token).await
        }
        async fn revoke(&self, token: &str) -> StoreResult<bool> {
            self.inner.revoke(token).await
        }
        async fn claim(&self, token: &str, _now: DateTime<Utc>) -> StoreResult<bool> {
            self.clock.advance(chrono::Duration::days(8));
            self.inner.claim(token, self.clock.now()).await
        }
        async fn revoke_all_for_user(&self, user_id: UserId) -> StoreResult<u64> {
            self.inner.revoke_all_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_refresh_expiring_mid_rotation() {
        let clock = ManualClock::starting_now();
        let tokens = Arc::new(MemoryRefreshTokenStore::with_clock(Arc::new(clock.clone())));
        let store = ExpiresBeforeClaim {
            inner: tokens.clone(),
            clock: clock.clone(),
        };
        let jwt = JwtManager::new(
            JwtConfig::new("service-test-secret-that-is-long-enough"),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let service = AuthService::new(
            Arc::new(MemoryUserStore::with_clock(Arc::new(clock.clone()))),
            Arc::new(store),
            jwt,
            PasswordHasher::new(PasswordConfig::minimal_cost()).unwrap(),
            Duration::from_secs(2),
        );
        service.register(registration("alice", "alice@example.com")).await.unwrap();
        let pair = service.login("alice@example.com", "s3cret-password").await.unwrap();

        let err = service.refresh_access_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenExpired));

        let row = tokens.find_by_token(&pair.refresh_token).await.unwrap().unwrap();
        assert!(!row.revoked);
    }

    #[tokio::test]
    async fn test_revoke_all_blast_radius() {
        let f = fixture();
        registered(&f, "alice").await;
        registered(&f, "bob").await;

        let a1 = f.service.login("alice@example.com", "s3cret-password").await.unwrap();
        let a2 = f.service.login("alice@example.com", "s3cret-password").await.unwrap();
        let b1 = f.service.login("bob@example.com", "s3cret-password").await.unwrap();

        assert_eq!(f.service.revoke_all_user_tokens(a1.user.id).await.unwrap(), 2);

        for token in [&a1.refresh_token, &a2.refresh_token] {
            let err = f.service.refresh_access_token(token).await.unwrap_err();
            assert!(matches!(err, AuthError::RefreshTokenRevoked));
        }
        f.service.refresh_access_token(&b1.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_ownership() {
        let f = fixture();
        let alice = registered(&f, "alice").await;
        let bob = registered(&f, "bob").await;
        let pair = f.service.login("bob@example.com", "s3cret-password").await.unwrap();

        let err = f.service.logout(alice.id, Some(&pair.refresh_token)).await.unwrap_err();
        assert!(matches!(err, AuthError::AccessDenied(_)));
        f.service.validate_refresh_token(&pair.refresh_token).await.unwrap();

        f.service.logout(bob.id, Some(&pair.refresh_token)).await.unwrap();
        f.service.logout(bob.id, Some(&pair.refresh_token)).await.unwrap();
        f.service.logout(bob.id, Some("unknown")).await.unwrap();
        f.service.logout(bob.id, None).await.unwrap();

        let err = f.service.validate_refresh_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenRevoked));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let f = fixture();
        let user = registered(&f, "alice").await;
        let pair = f.service.login("alice@example.com", "s3cret-password").await.unwrap();

        let err = f
            .service
            .change_password(user.id, "wrong-password", "brand-new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = f
            .service
            .change_password(user.id, "s3cret-password", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let revoked = f
            .service
            .change_password(user.id, "s3cret-password", "brand-new-password")
            .await
            .unwrap();
        assert_eq!(revoked, 1);

        let err = f.service.refresh_access_token(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenRevoked));

        f.service.login("alice@example.com", "brand-new-password").await.unwrap();
        assert!(f.service.login("alice@example.com", "s3cret-password").await.is_err());
    }

    // -------------------------------------------------------------------------
    // Store failures
    // -------------------------------------------------------------------------

    #[derive(Debug)]
    struct StalledTokens;

    #[async_trait]
    impl RefreshTokenStore for StalledTokens {
        async fn create(&self, _token: NewRefreshToken) -> StoreResult<RefreshToken> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(StoreError::backend("unreachable"))
        }
        async fn find_by_token(&self, _token: &str) -> StoreResult<Option<RefreshToken>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
        async fn revoke(&self, _token: &str) -> StoreResult<bool> {
            Ok(false)
        }
        async fn claim(&self, _token: &str, _now: DateTime<Utc>) -> StoreResult<bool> {
            Ok(false)
        }
        async fn revoke_all_for_user(&self, _user_id: UserId) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[derive(Debug)]
    struct FailingTokens;

    #[async_trait]
    impl RefreshTokenStore for FailingTokens {
        async fn create(&self, _token: NewRefreshToken) -> StoreResult<RefreshToken> {
            Err(StoreError::backend("disk full"))
        }
        async fn find_by_token(&self, _token: &str) -> StoreResult<Option<RefreshToken>> {
            Ok(None)
        }
        async fn revoke(&self, _token: &str) -> StoreResult<bool> {
            Ok(false)
        }
        async fn claim(&self, _token: &str, _now: DateTime<Utc>) -> StoreResult<bool> {
            Ok(false)
        }
        async fn revoke_all_for_user(&self, _user_id: UserId) -> StoreResult<u64> {
            Ok(0)
        }
    }

    fn service_with_tokens(tokens: Arc<dyn RefreshTokenStore>) -> (AuthService, Arc<MemoryUserStore>) {
        let clock = Arc::new(ManualClock::starting_now());
        let users = Arc::new(MemoryUserStore::new());
        let jwt = JwtManager::new(JwtConfig::new("service-test-secret-that-is-long-enough"), clock).unwrap();
        let hasher = PasswordHasher::new(PasswordConfig::minimal_cost()).unwrap();
        let service = AuthService::new(users.clone(), tokens, jwt, hasher, Duration::from_millis(50));
        (service, users)
    }

    #[tokio::test]
    async fn test_store_deadline() {
        let (service, _) = service_with_tokens(Arc::new(StalledTokens));

        let err = service.validate_refresh_token("anything").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_no_tokens_when_persistence_fails() {
        let (service, _) = service_with_tokens(Arc::new(FailingTokens));
        service.register(registration("alice", "alice@example.com")).await.unwrap();

        let err = service.login("alice@example.com", "s3cret-password").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::Backend(_))));
    }
}
