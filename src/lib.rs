//! Agent Key Gateway library
//!
//! API-key authentication, per-key rate limiting, and asynchronous usage
//! accounting in front of an agent-style HTTP service, backed by DynamoDB.

// Public modules
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod server;
pub mod services;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use server::App;
