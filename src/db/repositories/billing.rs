//! Billing summary repository
//!
//! Data access layer for per-service billing rollups.

use aws_sdk_dynamodb::types::AttributeValue;
use std::sync::Arc;

use crate::db::models::BillingSummary;
use crate::db::store::{BillingDelta, StoreError};
use crate::db::DynamoDbClient;

/// Repository for billing summary operations
#[derive(Clone)]
pub struct BillingRepository {
    client: Arc<DynamoDbClient>,
}

impl BillingRepository {
    /// Create a new billing repository
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Apply an additive delta to a service's billing summary.
    ///
    /// `if_not_exists` makes this a single conditional upsert: two concurrent
    /// first-events both succeed and their deltas add up, with no client-side
    /// read-check-write race.
    pub async fn apply_delta(
        &self,
        service_id: &str,
        delta: &BillingDelta,
    ) -> Result<(), StoreError> {
        let now = delta.at.to_rfc3339();

        self.client
            .client()
            .update_item()
            .table_name(self.client.usage_summary_table())
            .key("service_id", AttributeValue::S(service_id.to_string()))
            .update_expression(
                "SET total_messages = if_not_exists(total_messages, :zero) + :messages, \
                 total_tokens = if_not_exists(total_tokens, :zero) + :tokens, \
                 total_cost = if_not_exists(total_cost, :zero) + :cost, \
                 api_key_usage_count = if_not_exists(api_key_usage_count, :zero) + :api_requests, \
                 web_usage_count = if_not_exists(web_usage_count, :zero), \
                 created_at = if_not_exists(created_at, :now), \
                 last_activity = :now, \
                 updated_at = :now",
            )
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .expression_attribute_values(":messages", AttributeValue::N(delta.messages.to_string()))
            .expression_attribute_values(":tokens", AttributeValue::N(delta.tokens.to_string()))
            .expression_attribute_values(":cost", AttributeValue::N(delta.cost_usd.to_string()))
            .expression_attribute_values(
                ":api_requests",
                AttributeValue::N(delta.api_key_requests.to_string()),
            )
            .expression_attribute_values(":now", AttributeValue::S(now))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    /// Get the billing summary for a service, if one exists
    pub async fn get_summary(
        &self,
        service_id: &str,
    ) -> Result<Option<BillingSummary>, StoreError> {
        let result = self
            .client
            .client()
            .get_item()
            .table_name(self.client.usage_summary_table())
            .key("service_id", AttributeValue::S(service_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match result.item {
            Some(item) => BillingSummary::from_dynamodb(&item)
                .map(Some)
                .ok_or_else(|| StoreError::Malformed(format!("billing summary {}", service_id))),
            None => Ok(None),
        }
    }
}
