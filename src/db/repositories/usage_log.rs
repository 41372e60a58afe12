//! Usage log repository
//!
//! Data access layer for the append-only usage audit log.

use aws_sdk_dynamodb::types::AttributeValue;
use std::sync::Arc;

use crate::db::models::UsageLogEntry;
use crate::db::store::StoreError;
use crate::db::DynamoDbClient;

/// Repository for usage log operations
#[derive(Clone)]
pub struct UsageLogRepository {
    client: Arc<DynamoDbClient>,
}

impl UsageLogRepository {
    /// Create a new usage log repository
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Append one entry to the audit log
    pub async fn append(&self, entry: &UsageLogEntry) -> Result<(), StoreError> {
        self.client
            .client()
            .put_item()
            .table_name(self.client.usage_logs_table())
            .set_item(Some(entry.to_dynamodb()))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::debug!(
            key_id = %entry.key_id,
            path = %entry.request_path,
            status = entry.response_status,
            tokens_used = entry.tokens_used,
            "Appended usage log entry"
        );

        Ok(())
    }

    /// Get usage log entries for a key, most recent first
    pub async fn entries_for_key(
        &self,
        key_id: &str,
        since_timestamp: Option<&str>,
        limit: Option<i32>,
    ) -> Result<Vec<UsageLogEntry>, StoreError> {
        let mut key_condition = "key_id = :key_id".to_string();

        let mut query = self
            .client
            .client()
            .query()
            .table_name(self.client.usage_logs_table())
            .expression_attribute_values(":key_id", AttributeValue::S(key_id.to_string()));

        if let Some(since) = since_timestamp {
            key_condition.push_str(" AND #ts >= :since");
            query = query
                .expression_attribute_names("#ts", "timestamp")
                .expression_attribute_values(":since", AttributeValue::S(since.to_string()));
        }

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let result = query
            .key_condition_expression(key_condition)
            .scan_index_forward(false)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let entries = result
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(UsageLogEntry::from_dynamodb)
            .collect();

        Ok(entries)
    }
}
