//! # Management API
//!
//! The HTTP boundary around the core: a `/route` surface applications call to
//! get a request routed and executed, plus management endpoints for keys,
//! policies, and budgets.
//!
//! ## Endpoints
//!
//! - `POST /route` - route and execute a request end-to-end (unauthenticated;
//!   spec §6 treats the application-facing entry point as a boundary concern
//!   distinct from router configuration)
//! - `GET /route/preview` - return the routing decision without executing it
//! - `POST /keys`, `GET /keys`, `GET /keys/:id`, `POST /keys/:id/rotate`,
//!   `DELETE /keys/:id` - key lifecycle (bearer-authenticated)
//! - `POST /policies`, `GET /policies`, `DELETE /policies/:id` - policy CRUD
//!   (bearer-authenticated)
//! - `POST /budgets`, `GET /budgets`, `GET /budgets/:id`, `DELETE /budgets/:id`
//!   - budget CRUD (bearer-authenticated)
//! - `GET /health` - router liveness
//!
//! ## Example
//!
//! ```no_run
//! use keyrouter::api::{create_router, AppState};
//! use std::sync::Arc;
//!
//! # async fn example(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod budgets;
pub mod health;
pub mod keys;
pub mod policies;
pub mod rate_limit;
pub mod route;
pub mod types;

pub use types::ApiError;

use std::sync::Arc;
use std::time::Instant;

use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::adapter::AdapterRegistry;
use crate::clock::Context;
use crate::cost::CostController;
use crate::key::KeyManager;
use crate::orchestrator::Orchestrator;
use crate::policy::PolicyEngine;
use crate::routing::RoutingEngine;

/// Maximum request body size (1 MB — management payloads are small; large
/// completions bodies are the adapters' concern, not this boundary's).
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub routing_engine: Arc<RoutingEngine>,
    pub key_manager: Arc<KeyManager>,
    pub cost_controller: Arc<CostController>,
    pub policy_engine: Arc<PolicyEngine>,
    pub adapters: Arc<AdapterRegistry>,
    pub rate_limiter: rate_limit::RateLimiter,
    /// Bearer token mutation endpoints require. `None` disables auth, which
    /// is only appropriate for local development.
    pub management_token: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub start_time: Instant,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        routing_engine: Arc<RoutingEngine>,
        key_manager: Arc<KeyManager>,
        cost_controller: Arc<CostController>,
        policy_engine: Arc<PolicyEngine>,
        adapters: Arc<AdapterRegistry>,
        management_token: Option<String>,
        cors_allowed_origins: Vec<String>,
        ctx: Context,
    ) -> Self {
        Self {
            orchestrator,
            routing_engine,
            key_manager,
            cost_controller,
            policy_engine,
            adapters,
            rate_limiter: rate_limit::RateLimiter::new(20.0, 5.0, ctx),
            management_token,
            cors_allowed_origins,
            start_time: Instant::now(),
        }
    }

    #[cfg(test)]
    pub fn test_state_with_token(management_token: Option<String>) -> Self {
        use crate::crypto::EncryptionService;
        use crate::store::memory::InMemoryStateStore;

        let ctx = Context::system();
        let store: Arc<dyn crate::store::StateStore> = Arc::new(InMemoryStateStore::default());
        let encryption = Arc::new(EncryptionService::new(&[0u8; 32]).unwrap());
        let key_manager = Arc::new(KeyManager::new(store.clone(), encryption, ctx.clone()));
        let routing_engine = Arc::new(RoutingEngine::new(key_manager.clone(), store, ctx.clone()));
        let adapters = Arc::new(AdapterRegistry::new());
        let orchestrator = Arc::new(Orchestrator::new(
            routing_engine.clone(),
            key_manager.clone(),
            adapters.clone(),
            ctx.clone(),
        ));

        Self::new(
            orchestrator,
            routing_engine,
            key_manager,
            Arc::new(CostController::new(ctx.clone())),
            Arc::new(PolicyEngine::new(ctx.clone())),
            adapters,
            management_token,
            Vec::new(),
            ctx,
        )
    }
}

/// Insert a fixed set of security headers on every response: no sniffing, no
/// embedding in frames, conservative referrer policy.
async fn security_headers(request: axum::http::Request<axum::body::Body>, next: middleware::Next) -> axum::response::Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    response
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, axum::http::header::AUTHORIZATION])
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mutation_routes = Router::new()
        .route("/keys", post(keys::register))
        .route("/keys/:id/rotate", post(keys::rotate))
        .route("/keys/:id", delete(keys::revoke))
        .route("/policies", post(policies::create))
        .route("/policies/:id", delete(policies::delete))
        .route("/budgets", post(budgets::create))
        .route("/budgets/:id", delete(budgets::delete))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::enforce_rate_limit));

    let read_routes = Router::new()
        .route("/keys", get(keys::list))
        .route("/keys/:id", get(keys::get))
        .route("/policies", get(policies::list))
        .route("/budgets", get(budgets::list))
        .route("/budgets/:id", get(budgets::get));

    let route_surface = Router::new()
        .route("/route", post(route::execute))
        .route("/route/preview", get(route::preview));

    Router::new()
        .merge(mutation_routes)
        .merge(read_routes)
        .merge(route_surface)
        .route("/health", get(health::handle))
        .layer(cors_layer(&state.cors_allowed_origins))
        .layer(middleware::from_fn(security_headers))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(state)
}
