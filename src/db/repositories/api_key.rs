//! API key repository
//!
//! Data access layer for API key records.

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::models::{ApiKeyRecord, KeyStatus};
use crate::db::store::StoreError;
use crate::db::DynamoDbClient;

/// Repository for API key record operations
#[derive(Clone)]
pub struct ApiKeyRepository {
    client: Arc<DynamoDbClient>,
}

impl ApiKeyRepository {
    /// Create a new API key repository
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Fetch all active key records for a service instance.
    ///
    /// There is no index on `key_hash`; the validator compares the candidate
    /// digest against each returned record. Paginates until the scan is
    /// exhausted so no active key is missed.
    pub async fn active_keys_for_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let result = self
                .client
                .client()
                .scan()
                .table_name(self.client.api_keys_table())
                .filter_expression("service_id = :service_id AND #st = :active")
                .expression_attribute_names("#st", "status")
                .expression_attribute_values(":service_id", AttributeValue::S(service_id.to_string()))
                .expression_attribute_values(
                    ":active",
                    AttributeValue::S(KeyStatus::Active.as_str().to_string()),
                )
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            for item in result.items() {
                match ApiKeyRecord::from_dynamodb(item, self.client.default_rate_limit()) {
                    Some(record) => records.push(record),
                    None => {
                        // Skip malformed rows rather than failing the whole
                        // authentication path; the bad row is a store bug.
                        tracing::warn!(
                            service_id = %service_id,
                            "Skipping malformed API key record"
                        );
                    }
                }
            }

            start_key = result.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(records)
    }

    /// Atomically bump `total_calls` and refresh `last_used` on a key record.
    ///
    /// Uses a server-side `ADD` so concurrent requests never lose increments.
    pub async fn record_authentication(
        &self,
        key_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.client
            .client()
            .update_item()
            .table_name(self.client.api_keys_table())
            .key("id", AttributeValue::S(key_id.to_string()))
            .update_expression("ADD total_calls :one SET last_used = :at")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":at", AttributeValue::S(at.to_rfc3339()))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    /// Get a key record by id
    pub async fn get_key(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let result = self
            .client
            .client()
            .get_item()
            .table_name(self.client.api_keys_table())
            .key("id", AttributeValue::S(key_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match result.item {
            Some(item) => ApiKeyRecord::from_dynamodb(&item, self.client.default_rate_limit())
                .map(Some)
                .ok_or_else(|| StoreError::Malformed(format!("api key record {}", key_id))),
            None => Ok(None),
        }
    }
}
