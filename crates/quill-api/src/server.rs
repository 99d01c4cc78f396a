// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use thiserror::Error;
use tracing::info;

use crate::config::{ApiConfig, ConfigError};
use crate::handlers;
use crate::middleware::{AuthLayer, OwnerOrAdminLayer, RateLimitLayer, RbacLayer};
use crate::state::AppState;

// =============================================================================
// ServeError
// =============================================================================

/// Failure to start or keep serving.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not be bound.
    #[error("Failed to bind {addr}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop stopped with an error.
    #[error("Server error")]
    Serve(#[source] std::io::Error),
}

// =============================================================================
// ApiServer
// =============================================================================

/// The API server.
pub struct ApiServer {
    state: AppState,
    config: Arc<ApiConfig>,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self { state, config }
    }

    /// Builds a server with in-memory stores from a prepared configuration.
    pub fn from_config(config: ApiConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(AppState::builder().config(config).build()?))
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Creates the router with all routes and middleware.
    ///
    /// Per-group guards are attached with `route_layer`, so authentication
    /// runs before the role and ownership checks and only on matched routes.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Runs the server until `shutdown_signal` resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServeError> {
        let addr = self.config.socket_addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        let sweeper = self.state.rate_limiter.spawn_sweeper();

        info!(
            addr = %addr,
            environment = %self.config.environment,
            "Starting API server"
        );

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await;

        sweeper.abort();
        served.map_err(ServeError::Serve)?;

        info!("API server shutdown complete");
        Ok(())
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.config.socket_addr()
    }
}

// =============================================================================
// Router
// =============================================================================

/// Builds the full router for a state.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let jwt = state.jwt_manager.clone();

    let public: Router<AppState> = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh));

    let optional: Router<AppState> = Router::new()
        .route("/auth/session", get(handlers::session))
        .route_layer(AuthLayer::optional(jwt.clone()));

    let protected: Router<AppState> = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route("/auth/me", get(handlers::current_user))
        .route("/auth/password", put(handlers::change_password))
        .route_layer(AuthLayer::required(jwt.clone()));

    let owned: Router<AppState> = Router::new()
        .route("/users/{id}", get(handlers::get_user))
        .route_layer(OwnerOrAdminLayer::path_param("id"))
        .route_layer(AuthLayer::required(jwt.clone()));

    let admin: Router<AppState> = Router::new()
        .route(
            "/admin/users/{id}/revoke-sessions",
            post(handlers::revoke_user_sessions),
        )
        .route_layer(RbacLayer::admin_only())
        .route_layer(AuthLayer::required(jwt));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(create_cors_layer(&config))
        .layer(RateLimitLayer::new(state.rate_limiter.clone()));

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .merge(owned)
        .merge(admin)
        .layer(middleware_stack)
        .with_state(state)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer from configuration.
fn create_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = &config.cors;

    let mut layer = CorsLayer::new().max_age(Duration::from_secs(cors.max_age));

    if cors.allows_any_origin() {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer = layer.allow_origin(AllowOrigin::list(origins));
    }

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    layer = layer.allow_methods(methods);

    if cors.allowed_headers.iter().any(|h| h == "*") {
        layer = layer.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = cors
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer = layer.allow_headers(headers);
    }

    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::config::{CorsConfig, Environment};
    use axum::body::Body;
    use axum::http::{Request, header};
    use quill_core::PasswordConfig;
    use tower::ServiceExt;

    fn test_config() -> ApiConfig {
        ApiConfig::default()
            .with_jwt(JwtConfig::new("test-secret-key-that-is-long-enough"))
            .with_password(PasswordConfig::minimal_cost())
    }

    #[test]
    fn test_server_from_config() {
        let server = ApiServer::from_config(test_config()).unwrap();
        assert_eq!(server.addr().port(), 8080);
    }

    #[test]
    fn test_production_server_needs_strong_secret() {
        let config = test_config()
            .with_environment(Environment::Production)
            .with_jwt(JwtConfig::new("short"));
        assert!(matches!(
            ApiServer::from_config(config),
            Err(ConfigError::WeakSecret { .. })
        ));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = test_config()
            .with_host("127.0.0.1".parse().unwrap())
            .with_port(port);

        let err = ApiServer::from_config(config)
            .unwrap()
            .run_with_shutdown(std::future::pending())
            .await
            .unwrap_err();
        match err {
            ServeError::Bind { addr, .. } => assert_eq!(addr.port(), port),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let router = ApiServer::from_config(test_config()).unwrap().router();
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
    }

    #[tokio::test]
    async fn test_guarded_routes_need_token() {
        let router = ApiServer::from_config(test_config()).unwrap().router();
        for (method, uri) in [
            ("POST", "/auth/logout"),
            ("POST", "/auth/logout-all"),
            ("GET", "/auth/me"),
            ("PUT", "/auth/password"),
            ("GET", "/users/1"),
            ("POST", "/admin/users/1/revoke-sessions"),
        ] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_session_is_optional() {
        let router = ApiServer::from_config(test_config()).unwrap().router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/auth/session")
                    .header(header::AUTHORIZATION, "Bearer nonsense")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_guarded() {
        let router = ApiServer::from_config(test_config()).unwrap().router();
        let response = router
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_layer_with_explicit_origins() {
        let config = ApiConfig {
            cors: CorsConfig::strict(vec!["https://app.example.com".into()]),
            ..test_config()
        };
        let _layer = create_cors_layer(&config);
    }
}
