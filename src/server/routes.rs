//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{auth_info, conversation, health, usage};
use crate::middleware::{
    auth::{api_key_auth, AuthState},
    logging::log_request,
};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Health check routes (no authentication required)
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness))
        .route("/liveness", get(health::liveness));

    let auth_state = AuthState::new(
        state.validator.clone(),
        state.limiter.clone(),
        state.usage.clone(),
        state.settings.service_id.clone(),
        state.settings.rate_limit.enabled,
    );

    // Agent routes run behind the API key middleware. Requests without an
    // ak_ bearer token still reach the handlers (pass-through); handlers
    // decide what anonymous callers may do.
    let agent_routes = Router::new()
        .route("/conversation/create", post(conversation::create_conversation))
        .route("/conversation/message", post(conversation::send_message))
        .route("/usage/recent", get(usage::recent_usage))
        .route("/usage/summary", get(usage::usage_summary));

    let authed_routes = Router::new()
        .nest("/api", agent_routes)
        .route("/auth/info", get(auth_info::auth_info))
        .layer(middleware::from_fn_with_state(auth_state, api_key_auth));

    Router::new()
        .merge(authed_routes)
        .merge(health_routes)
        // Layer order: first added = outermost = runs first
        .layer(create_cors_layer())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Create CORS layer with permissive settings for development
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            "x-trace-id".parse().unwrap(),
            // Usage side-channel headers, so browser clients can read them too
            "x-token-count".parse().unwrap(),
            "x-cost-usd".parse().unwrap(),
        ])
}
