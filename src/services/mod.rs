//! Services module
//!
//! Contains the key-validation, rate-limiting, and usage-accounting core.

pub mod rate_limiter;
pub mod usage_tracker;
pub mod validator;

pub use rate_limiter::{FixedWindowLimiter, RateDecision};
pub use usage_tracker::{UsageEvent, UsageTracker, UsageTrackerHandle, DEFAULT_QUEUE_CAPACITY};
pub use validator::{KeyValidator, KEY_PREFIX, KEY_SECRET_LEN};
