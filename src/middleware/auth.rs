//! Authentication middleware
//!
//! Intercepts requests ahead of the agent handlers: extracts the bearer
//! token, validates API-key candidates against the credential store, enforces
//! the per-key rate limit, attaches the authenticated identity to the request,
//! and hands the response's usage signals to the accounting worker.
//!
//! Bearer tokens without the `ak_` prefix are not API-key attempts; those
//! requests pass through untouched so the surrounding framework can apply its
//! own authentication scheme.

use axum::{
    body::Body, extract::State, http::Request, middleware::Next, response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::services::rate_limiter::{FixedWindowLimiter, RateDecision};
use crate::services::usage_tracker::{UsageEvent, UsageTrackerHandle};
use crate::services::validator::{KeyValidator, KEY_PREFIX};

/// Response header carrying the downstream token count.
pub const TOKEN_COUNT_HEADER: &str = "x-token-count";

/// Response header carrying the downstream cost in USD.
pub const COST_USD_HEADER: &str = "x-cost-usd";

/// Marker value for identities established through an API key.
pub const AUTH_METHOD_API_KEY: &str = "api_key";

// ============================================================================
// Identity
// ============================================================================

/// Identity attached to request extensions after successful authentication.
///
/// Downstream handlers and observability use this to discriminate the
/// authentication source.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyIdentity {
    /// Id of the key record (never the key itself)
    pub key_id: String,

    /// Principal that owns the key
    pub user_id: String,

    /// Tenant grouping, if the key carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Always `"api_key"` for identities minted here
    pub auth_method: &'static str,
}

/// Truncate a key for safe logging (first 8 chars + ...)
fn truncate_key(key: &str) -> String {
    match key.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &key[..idx]),
        None => key.to_string(),
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// State required by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<KeyValidator>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub usage: UsageTrackerHandle,
    pub service_id: String,
    pub rate_limit_enabled: bool,
}

impl AuthState {
    pub fn new(
        validator: Arc<KeyValidator>,
        limiter: Arc<FixedWindowLimiter>,
        usage: UsageTrackerHandle,
        service_id: impl Into<String>,
        rate_limit_enabled: bool,
    ) -> Self {
        Self {
            validator,
            limiter,
            usage,
            service_id: service_id.into(),
            rate_limit_enabled,
        }
    }
}

/// API key authentication middleware.
///
/// Per request:
/// 1. Extract the `Authorization: Bearer` token; without an `ak_`-prefixed
///    token the request passes through unauthenticated.
/// 2. Validate the candidate key (401 on mismatch/expiry, 500 if the store
///    is unreachable).
/// 3. Check and consume the key's rate-limit window (429 when exhausted).
/// 4. Attach `ApiKeyIdentity` to request extensions and forward.
/// 5. After the response, read the optional `X-Token-Count` / `X-Cost-USD`
///    side-channel headers and enqueue a usage event. The enqueue never
///    blocks the response.
pub async fn api_key_auth(
    State(auth): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let candidate = bearer_token(&request)
        .filter(|token| token.starts_with(KEY_PREFIX))
        .map(|token| token.to_string());

    let Some(candidate) = candidate else {
        // Not an API-key attempt; downstream may apply a different scheme
        return Ok(next.run(request).await);
    };

    let start = Instant::now();

    // One message for missing, mismatched, and expired keys so callers
    // cannot enumerate which check failed.
    let record = auth
        .validator
        .validate(&candidate)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or inactive API key".to_string()))?;

    if auth.rate_limit_enabled
        && auth.limiter.check_and_increment(&record.id, record.rate_limit)
            == RateDecision::Throttled
    {
        tracing::warn!(
            key = %truncate_key(&candidate),
            key_id = %record.id,
            rate_limit = record.rate_limit,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimitExceeded);
    }

    let identity = ApiKeyIdentity {
        key_id: record.id.clone(),
        user_id: record.created_by.clone(),
        organization_id: record.organization_id.clone(),
        auth_method: AUTH_METHOD_API_KEY,
    };
    request.extensions_mut().insert(identity);

    let request_path = request.uri().path().to_string();
    let method = request.method().to_string();

    let response = next.run(request).await;

    // Optional side-channel signals from the downstream handler; absence is
    // normal and means zero.
    let tokens_used = response_header_parsed(&response, TOKEN_COUNT_HEADER).unwrap_or(0i64);
    let cost_usd = response_header_parsed(&response, COST_USD_HEADER).unwrap_or(0.0f64);

    auth.usage.submit(UsageEvent {
        key_id: record.id,
        service_id: auth.service_id.clone(),
        request_path,
        method,
        response_status: response.status().as_u16(),
        tokens_used,
        cost_usd,
        user_id: Some(record.created_by),
        organization_id: record.organization_id,
        duration_ms: Some(start.elapsed().as_millis() as i64),
    });

    Ok(response)
}

/// Extract the bearer token from the authorization header
fn bearer_token<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn response_header_parsed<T: std::str::FromStr>(response: &Response, name: &str) -> Option<T> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

// ============================================================================
// Tests
// ============================================================================
