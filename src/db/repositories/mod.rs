//! Data access layer
//!
//! One repository per table; all of them speak through the shared
//! `DynamoDbClient` wrapper.

pub mod api_key;
pub mod billing;
pub mod usage_log;

pub use api_key::ApiKeyRepository;
pub use billing::BillingRepository;
pub use usage_log::UsageLogRepository;
