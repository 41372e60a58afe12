//! Database module
//!
//! Contains the DynamoDB client, data models, the `CredentialStore` boundary,
//! and its DynamoDB-backed implementation.

pub mod dynamodb;
pub mod models;
pub mod repositories;
pub mod store;

pub use dynamodb::DynamoDbClient;
pub use models::{ApiKeyRecord, BillingSummary, KeyStatus, UsageLogEntry};
pub use store::{BillingDelta, CredentialStore, StoreError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use repositories::{ApiKeyRepository, BillingRepository, UsageLogRepository};
use std::sync::Arc;

/// DynamoDB-backed credential store.
///
/// Thin composition of the three repositories behind the `CredentialStore`
/// boundary the middleware core depends on.
#[derive(Clone)]
pub struct DynamoCredentialStore {
    api_keys: ApiKeyRepository,
    usage_logs: UsageLogRepository,
    billing: BillingRepository,
}

impl DynamoCredentialStore {
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            api_keys: ApiKeyRepository::new(client.clone()),
            usage_logs: UsageLogRepository::new(client.clone()),
            billing: BillingRepository::new(client),
        }
    }
}

#[async_trait]
impl CredentialStore for DynamoCredentialStore {
    async fn active_keys_for_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<ApiKeyRecord>, StoreError> {
        self.api_keys.active_keys_for_service(service_id).await
    }

    async fn record_authentication(
        &self,
        key_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.api_keys.record_authentication(key_id, at).await
    }

    async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), StoreError> {
        self.usage_logs.append(entry).await
    }

    async fn apply_billing_delta(
        &self,
        service_id: &str,
        delta: &BillingDelta,
    ) -> Result<(), StoreError> {
        self.billing.apply_delta(service_id, delta).await
    }

    async fn key_by_id(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        self.api_keys.get_key(key_id).await
    }

    async fn usage_entries_for_key(
        &self,
        key_id: &str,
        limit: i32,
    ) -> Result<Vec<UsageLogEntry>, StoreError> {
        self.usage_logs.entries_for_key(key_id, None, Some(limit)).await
    }

    async fn billing_summary(
        &self,
        service_id: &str,
    ) -> Result<Option<BillingSummary>, StoreError> {
        self.billing.get_summary(service_id).await
    }
}
