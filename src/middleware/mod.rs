//! Middleware module
//!
//! Contains HTTP middleware for API key authentication and request logging.

pub mod auth;
pub mod logging;

// Re-export commonly used items
pub use auth::{
    api_key_auth, ApiKeyIdentity, AuthState, AUTH_METHOD_API_KEY, COST_USD_HEADER,
    TOKEN_COUNT_HEADER,
};
pub use logging::{log_request, TRACE_ID_HEADER};
