// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tiered per-client rate limiting.
//!
//! Every request is classified into an [`EndpointClass`] and charged against
//! a token bucket keyed by client IP, route and class. Buckets live in a
//! sharded [`DashMap`] and are evicted by a background sweep once idle.
//!
//! The route is the matched route template, so `/users/1` and `/users/2`
//! share a bucket and requests that match no route all share one.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower::{Layer, Service};

use crate::config::{ConfigError, duration_secs};
use crate::error::{ApiError, ErrorCode};

/// Maximum requests in the current window.
pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window.
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Seconds until the next request is accepted.
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Bucket path for requests that match no route.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

// =============================================================================
// EndpointClass
// =============================================================================

/// Rate-limit tier of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// `POST /auth/login`.
    Login,
    /// `POST /auth/register`.
    Register,
    /// `POST /auth/refresh`.
    Refresh,
    /// Any other POST, PUT, PATCH or DELETE.
    Write,
    /// Everything else.
    Read,
}

impl EndpointClass {
    /// Classifies a request by method and path.
    pub fn classify(method: &Method, path: &str) -> Self {
        let path = path.trim_end_matches('/');
        if path.ends_with("/auth/login") {
            Self::Login
        } else if path.ends_with("/auth/register") {
            Self::Register
        } else if path.ends_with("/auth/refresh") {
            Self::Refresh
        } else if matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
            Self::Write
        } else {
            Self::Read
        }
    }

    /// Returns `true` for the credential endpoints.
    pub fn is_auth_endpoint(&self) -> bool {
        matches!(self, Self::Login | Self::Register | Self::Refresh)
    }

    /// Returns the error code used when this class is exhausted.
    pub fn error_code(&self) -> ErrorCode {
        if self.is_auth_endpoint() {
            ErrorCode::RateLimitEndpoint
        } else {
            ErrorCode::RateLimit
        }
    }

    /// Returns the class name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Refresh => "refresh",
            Self::Write => "write",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RateLimitConfig
// =============================================================================

/// Configuration for rate limiting.
///
/// Limits are requests per `window` for one client on one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Login attempts per window.
    pub login: u32,
    /// Registrations per window.
    pub register: u32,
    /// Refreshes per window.
    pub refresh: u32,
    /// Other writes per window.
    pub write: u32,
    /// Reads per window.
    pub read: u32,
    /// Window length.
    #[serde(with = "duration_secs")]
    pub window: Duration,
    /// Buckets untouched for this long are evicted.
    #[serde(with = "duration_secs")]
    pub idle_ttl: Duration,
    /// Interval of the background sweep.
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
    /// Upper bound on tracked buckets.
    pub max_keys: usize,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login: 5,
            register: 3,
            refresh: 10,
            write: 30,
            read: 60,
            window: Duration::from_secs(60),
            idle_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            max_keys: 100_000,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Creates a disabled rate limiter.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Returns the limit for a class.
    pub fn limit_for(&self, class: EndpointClass) -> u32 {
        match class {
            EndpointClass::Login => self.login,
            EndpointClass::Register => self.register,
            EndpointClass::Refresh => self.refresh,
            EndpointClass::Write => self.write,
            EndpointClass::Read => self.read,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        for class in [
            EndpointClass::Login,
            EndpointClass::Register,
            EndpointClass::Refresh,
            EndpointClass::Write,
            EndpointClass::Read,
        ] {
            if self.limit_for(class) == 0 {
                return Err(ConfigError::invalid(format!(
                    "rate_limit.{} must be greater than zero",
                    class
                )));
            }
        }
        if self.window.is_zero() {
            return Err(ConfigError::invalid("rate_limit.window must be greater than zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::invalid(
                "rate_limit.sweep_interval must be greater than zero",
            ));
        }
        if self.idle_ttl < self.window {
            return Err(ConfigError::invalid(
                "rate_limit.idle_ttl must not be shorter than rate_limit.window",
            ));
        }
        if self.max_keys == 0 {
            return Err(ConfigError::invalid("rate_limit.max_keys must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Token Bucket
// =============================================================================

/// Token bucket refilled continuously at `capacity / window`.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, window: Duration, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            last_refill: now,
            last_seen: now,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.last_seen = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn remaining(&self) -> u32 {
        self.tokens.floor() as u32
    }

    /// Whole seconds until one token is available, at least 1.
    fn retry_after_secs(&self) -> u64 {
        let needed = (1.0 - self.tokens).max(0.0);
        ((needed / self.refill_per_sec).ceil() as u64).max(1)
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= ttl
    }
}

// =============================================================================
// Rate Limiter State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    ip: IpAddr,
    path: String,
    class: EndpointClass,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Limiting is disabled.
    Bypassed,
    /// The request was charged and may proceed.
    Allowed {
        /// Limit of the bucket.
        limit: u32,
        /// Tokens left after this request.
        remaining: u32,
    },
    /// The bucket is empty.
    Limited {
        /// Class of the exhausted bucket.
        class: EndpointClass,
        /// Limit of the bucket.
        limit: u32,
        /// Seconds until a retry can succeed.
        retry_after: u64,
    },
}

impl RateLimitDecision {
    /// Returns `true` unless the request was rejected.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Limited { .. })
    }
}

/// Shared bucket registry.
#[derive(Debug)]
pub struct RateLimiterState {
    config: RateLimitConfig,
    buckets: DashMap<BucketKey, TokenBucket>,
}

impl RateLimiterState {
    /// Creates an empty registry.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of tracked buckets.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Charges one request against its bucket.
    pub fn check(&self, ip: IpAddr, method: &Method, path: &str) -> RateLimitDecision {
        self.check_at(ip, method, path, Instant::now())
    }

    /// Charges one request at an explicit instant.
    pub fn check_at(&self, ip: IpAddr, method: &Method, path: &str, now: Instant) -> RateLimitDecision {
        self.charge(ip, EndpointClass::classify(method, path), path, now)
    }

    /// Charges a routed request: classified by its path, keyed by `route`.
    pub fn check_route(&self, ip: IpAddr, method: &Method, path: &str, route: &str) -> RateLimitDecision {
        self.charge(ip, EndpointClass::classify(method, path), route, Instant::now())
    }

    fn charge(&self, ip: IpAddr, class: EndpointClass, route: &str, now: Instant) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::Bypassed;
        }

        let limit = self.config.limit_for(class);
        let key = BucketKey {
            ip,
            path: route.to_string(),
            class,
        };

        if !self.buckets.contains_key(&key) && self.buckets.len() >= self.config.max_keys {
            self.sweep(now);
            if self.buckets.len() >= self.config.max_keys {
                return self.registry_full(class, limit);
            }
        }

        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(limit, self.config.window, now));

        if bucket.try_acquire(now) {
            RateLimitDecision::Allowed {
                limit,
                remaining: bucket.remaining(),
            }
        } else {
            RateLimitDecision::Limited {
                class,
                limit,
                retry_after: bucket.retry_after_secs(),
            }
        }
    }

    /// Decision for a new key when the registry has no room left.
    ///
    /// Credential endpoints are refused; other requests pass untracked.
    fn registry_full(&self, class: EndpointClass, limit: u32) -> RateLimitDecision {
        let tracked = self.buckets.len();
        if class.is_auth_endpoint() {
            tracing::warn!(
                tracked,
                max_keys = self.config.max_keys,
                class = %class,
                "Rate limiter registry full, rejecting credential request"
            );
            RateLimitDecision::Limited {
                class,
                limit,
                retry_after: self.config.window.as_secs().max(1),
            }
        } else {
            tracing::warn!(
                tracked,
                max_keys = self.config.max_keys,
                "Rate limiter registry full, request not tracked"
            );
            RateLimitDecision::Allowed {
                limit,
                remaining: limit.saturating_sub(1),
            }
        }
    }

    /// Evicts idle buckets and returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        let ttl = self.config.idle_ttl;
        self.buckets.retain(|_, bucket| !bucket.is_idle(now, ttl));
        before.saturating_sub(self.buckets.len())
    }

    /// Spawns the periodic sweep.
    ///
    /// The task holds a weak reference and exits once the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(state) = weak.upgrade() else {
                    break;
                };
                let evicted = state.sweep(Instant::now());
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        tracked = state.tracked_keys(),
                        "Rate limiter sweep"
                    );
                }
            }
        })
    }
}

// =============================================================================
// RateLimitLayer
// =============================================================================

/// Layer for rate limiting.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimiterState>,
}

impl RateLimitLayer {
    /// Creates a layer over an existing registry.
    pub fn new(state: Arc<RateLimiterState>) -> Self {
        Self { state }
    }

    /// Creates a layer with its own registry.
    pub fn from_config(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(RateLimiterState::new(config)))
    }

    /// Returns the shared registry.
    pub fn state(&self) -> Arc<RateLimiterState> {
        self.state.clone()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

// =============================================================================
// RateLimitMiddleware
// =============================================================================

/// Middleware for rate limiting.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    state: Arc<RateLimiterState>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client_ip = client_ip(&req, self.state.config().trust_proxy_headers);
        let decision =
            self.state
                .check_route(client_ip, req.method(), req.uri().path(), route_path(&req));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match decision {
                RateLimitDecision::Bypassed => inner.call(req).await,
                RateLimitDecision::Allowed { limit, remaining } => {
                    let mut response = inner.call(req).await?;
                    let headers = response.headers_mut();
                    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
                    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
                    Ok(response)
                }
                RateLimitDecision::Limited {
                    class,
                    limit,
                    retry_after,
                } => {
                    tracing::debug!(
                        client_ip = %client_ip,
                        path = %req.uri().path(),
                        class = %class,
                        retry_after,
                        "Rate limit exceeded"
                    );
                    Ok(ApiError::rate_limited(class.error_code(), limit, retry_after).into_response())
                }
            }
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Resolves the client address of a request.
///
/// Falls back to `0.0.0.0` when no peer address is known, so all such
/// requests share one bucket per path.
pub fn client_ip<B>(req: &Request<B>, trust_proxy_headers: bool) -> IpAddr {
    resolve_client_ip(req.headers(), req.extensions(), trust_proxy_headers)
}

/// [`client_ip`] over the parts of a request.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_proxy_headers: bool,
) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Returns the matched route template, or [`UNMATCHED_ROUTE`].
pub fn route_path<B>(req: &Request<B>) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or(UNMATCHED_ROUTE)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };
    from_header(X_FORWARDED_FOR).or_else(|| from_header(X_REAL_IP))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn limited_config() -> RateLimitConfig {
        RateLimitConfig {
            login: 3,
            read: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(EndpointClass::classify(&Method::POST, "/auth/login"), EndpointClass::Login);
        assert_eq!(EndpointClass::classify(&Method::POST, "/api/v1/auth/login/"), EndpointClass::Login);
        assert_eq!(EndpointClass::classify(&Method::POST, "/auth/register"), EndpointClass::Register);
        assert_eq!(EndpointClass::classify(&Method::POST, "/auth/refresh"), EndpointClass::Refresh);
        assert_eq!(EndpointClass::classify(&Method::POST, "/auth/logout"), EndpointClass::Write);
        assert_eq!(EndpointClass::classify(&Method::PUT, "/auth/password"), EndpointClass::Write);
        assert_eq!(EndpointClass::classify(&Method::DELETE, "/users/1"), EndpointClass::Write);
        assert_eq!(EndpointClass::classify(&Method::GET, "/auth/me"), EndpointClass::Read);

        assert_eq!(EndpointClass::Login.error_code(), ErrorCode::RateLimitEndpoint);
        assert_eq!(EndpointClass::Read.error_code(), ErrorCode::RateLimit);
    }

    #[test]
    fn test_default_limits() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit_for(EndpointClass::Login), 5);
        assert_eq!(config.limit_for(EndpointClass::Register), 3);
        assert_eq!(config.limit_for(EndpointClass::Refresh), 10);
        assert_eq!(config.limit_for(EndpointClass::Write), 30);
        assert_eq!(config.limit_for(EndpointClass::Read), 60);
        assert_eq!(config.window, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero = RateLimitConfig {
            register: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let short_ttl = RateLimitConfig {
            idle_ttl: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(short_ttl.validate().is_err());

        let disabled = RateLimitConfig {
            register: 0,
            ..RateLimitConfig::disabled()
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_n_plus_one_then_window_elapses() {
        let state = RateLimiterState::new(limited_config());
        let client = ip("10.0.0.1");
        let t0 = Instant::now();

        for i in 0..3 {
            let decision = state.check_at(client, &Method::POST, "/auth/login", t0);
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    limit: 3,
                    remaining: 2 - i
                }
            );
        }

        match state.check_at(client, &Method::POST, "/auth/login", t0) {
            RateLimitDecision::Limited {
                class,
                limit,
                retry_after,
            } => {
                assert_eq!(class, EndpointClass::Login);
                assert_eq!(limit, 3);
                assert_eq!(retry_after, 20);
            }
            other => panic!("expected limited, got {other:?}"),
        }

        let later = t0 + Duration::from_secs(60);
        assert!(state.check_at(client, &Method::POST, "/auth/login", later).is_allowed());
    }

    #[test]
    fn test_buckets_are_per_client_path_and_class() {
        let state = RateLimiterState::new(limited_config());
        let t0 = Instant::now();
        let a = ip("10.0.0.1");
        let b = ip("10.0.0.2");

        for _ in 0..2 {
            assert!(state.check_at(a, &Method::GET, "/auth/me", t0).is_allowed());
        }
        assert!(!state.check_at(a, &Method::GET, "/auth/me", t0).is_allowed());

        assert!(state.check_at(b, &Method::GET, "/auth/me", t0).is_allowed());
        assert!(state.check_at(a, &Method::GET, "/health", t0).is_allowed());
        assert!(state.check_at(a, &Method::POST, "/auth/me", t0).is_allowed());
        assert_eq!(state.tracked_keys(), 4);
    }

    #[test]
    fn test_disabled_bypasses() {
        let state = RateLimiterState::new(RateLimitConfig::disabled());
        for _ in 0..1000 {
            assert_eq!(
                state.check(ip("10.0.0.1"), &Method::POST, "/auth/login"),
                RateLimitDecision::Bypassed
            );
        }
        assert_eq!(state.tracked_keys(), 0);
    }

    #[test]
    fn test_sweep_evicts_idle_buckets() {
        let state = RateLimiterState::new(RateLimitConfig::default());
        let t0 = Instant::now();
        state.check_at(ip("10.0.0.1"), &Method::GET, "/a", t0);
        state.check_at(ip("10.0.0.2"), &Method::GET, "/a", t0 + Duration::from_secs(300));

        assert_eq!(state.sweep(t0 + Duration::from_secs(599)), 0);
        assert_eq!(state.sweep(t0 + Duration::from_secs(600)), 1);
        assert_eq!(state.tracked_keys(), 1);
    }

    #[test]
    fn test_max_keys_bounds_registry() {
        let state = RateLimiterState::new(RateLimitConfig {
            max_keys: 3,
            ..Default::default()
        });
        let t0 = Instant::now();
        let client = ip("10.0.0.1");
        for n in 1..=3 {
            state.check_at(client, &Method::GET, &format!("/junk{n}"), t0);
        }
        assert_eq!(state.tracked_keys(), 3);

        // Reads pass untracked, credential endpoints are refused.
        assert!(state.check_at(client, &Method::GET, "/junk4", t0).is_allowed());
        let allowed = (0..50)
            .filter(|_| state.check_at(client, &Method::POST, "/auth/login", t0).is_allowed())
            .count();
        assert_eq!(allowed, 0);
        match state.check_at(client, &Method::POST, "/auth/refresh", t0) {
            RateLimitDecision::Limited { class, retry_after, .. } => {
                assert_eq!(class, EndpointClass::Refresh);
                assert_eq!(retry_after, 60);
            }
            other => panic!("expected limited, got {other:?}"),
        }
        assert_eq!(state.tracked_keys(), 3);

        // Idle entries make room.
        let later = t0 + Duration::from_secs(600);
        assert!(state.check_at(client, &Method::POST, "/auth/login", later).is_allowed());
        assert_eq!(state.tracked_keys(), 1);
    }

    #[test]
    fn test_route_path() {
        let req = Request::builder().uri("/junk/1").body(()).unwrap();
        assert_eq!(route_path(&req), UNMATCHED_ROUTE);
    }

    #[test]
    fn test_client_ip_resolution() {
        let req = Request::builder()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req, true), ip("203.0.113.7"));
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let mut req = Request::builder().header(X_REAL_IP, "198.51.100.2").body(()).unwrap();
        assert_eq!(client_ip(&req, true), ip("198.51.100.2"));

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_ip(&req, false), ip("192.0.2.1"));
    }

    #[tokio::test]
    async fn test_middleware_headers_and_rejection() {
        let layer = RateLimitLayer::from_config(limited_config());
        let service = layer.layer(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        }));

        let request = || {
            Request::builder()
                .method(Method::POST)
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap()
        };

        for expected in ["2", "1", "0"] {
            let response = service.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[&RATE_LIMIT_LIMIT], "3");
            assert_eq!(response.headers()[&RATE_LIMIT_REMAINING], expected);
        }

        let response = service.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[&RATE_LIMIT_REMAINING], "0");
        assert!(response.headers().contains_key("retry-after"));
        assert!(response.headers().contains_key(&RATE_LIMIT_RESET));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "ERR_RATE_LIMIT_ENDPOINT");
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_state_dropped() {
        let state = Arc::new(RateLimiterState::new(RateLimitConfig {
            sweep_interval: Duration::from_millis(10),
            ..Default::default()
        }));
        let handle = state.spawn_sweeper();
        drop(state);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
