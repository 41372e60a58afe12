//! Credential store boundary
//!
//! The gateway treats its persistence engine as an opaque document store
//! reachable by query. This trait is the whole of that contract: the
//! middleware core depends on it, the DynamoDB implementation lives in
//! `db::repositories`, and tests substitute an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{ApiKeyRecord, BillingSummary, UsageLogEntry};

/// Errors surfaced by the credential store.
///
/// Deliberately distinct from "key not found": callers must be able to tell
/// an invalid credential apart from an unavailable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the operation
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// A stored item could not be decoded into its model
    #[error("malformed store item: {0}")]
    Malformed(String),
}

/// Additive update applied to a service's billing summary.
///
/// All fields are deltas; the store applies them with get-or-create +
/// atomic-increment semantics so concurrent first-events never lose updates.
#[derive(Debug, Clone, Copy)]
pub struct BillingDelta {
    pub messages: i64,
    pub tokens: i64,
    pub cost_usd: f64,
    pub api_key_requests: i64,
    pub at: DateTime<Utc>,
}

/// Operations the gateway needs from its credential store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// All active key records issued for the given service instance.
    async fn active_keys_for_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Atomically bump `total_calls` by one and set `last_used` on a key
    /// record. Must be a server-side increment, not read-modify-write.
    async fn record_authentication(
        &self,
        key_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Append one immutable entry to the usage audit log.
    async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), StoreError>;

    /// Apply an additive delta to the service's billing summary, creating the
    /// row from the delta if it does not exist yet.
    async fn apply_billing_delta(
        &self,
        service_id: &str,
        delta: &BillingDelta,
    ) -> Result<(), StoreError>;

    /// Look up one key record by id.
    async fn key_by_id(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Most recent usage log entries for a key, newest first.
    async fn usage_entries_for_key(
        &self,
        key_id: &str,
        limit: i32,
    ) -> Result<Vec<UsageLogEntry>, StoreError>;

    /// The service's billing summary, if any cost-bearing event created one.
    async fn billing_summary(
        &self,
        service_id: &str,
    ) -> Result<Option<BillingSummary>, StoreError>;
}
