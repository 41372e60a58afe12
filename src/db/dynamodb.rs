//! DynamoDB client wrapper
//!
//! This module provides a wrapper around the AWS DynamoDB SDK client
//! for database operations.

use aws_sdk_dynamodb::Client as DynamoDbSdkClient;
use crate::config::Settings;
use std::sync::Arc;

/// DynamoDB client wrapper for credential-store operations.
///
/// Wraps the AWS SDK client together with the configured table names.
#[derive(Clone)]
pub struct DynamoDbClient {
    /// Application settings
    settings: Arc<Settings>,

    /// AWS DynamoDB SDK client
    client: DynamoDbSdkClient,
}

impl DynamoDbClient {
    /// Create a new DynamoDB client.
    ///
    /// # Arguments
    /// * `settings` - Application settings containing DynamoDB configuration
    /// * `client` - AWS DynamoDB SDK client
    pub fn new(settings: Arc<Settings>, client: DynamoDbSdkClient) -> Self {
        Self { settings, client }
    }

    /// Get a reference to the underlying AWS SDK client
    pub fn client(&self) -> &DynamoDbSdkClient {
        &self.client
    }

    /// Get the API keys table name
    pub fn api_keys_table(&self) -> &str {
        &self.settings.dynamodb_api_keys_table
    }

    /// Get the usage log table name
    pub fn usage_logs_table(&self) -> &str {
        &self.settings.dynamodb_usage_logs_table
    }

    /// Get the billing summary table name
    pub fn usage_summary_table(&self) -> &str {
        &self.settings.dynamodb_usage_summary_table
    }

    /// Fallback per-key rate limit for key records that carry none
    pub fn default_rate_limit(&self) -> u32 {
        self.settings.rate_limit.default_requests_per_minute
    }

    /// Check if the DynamoDB connection is healthy
    ///
    /// Performs a simple list_tables operation to verify connectivity.
    pub async fn health_check(&self) -> bool {
        match self.client.list_tables().limit(1).send().await {
            Ok(_) => {
                tracing::debug!("DynamoDB health check passed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "DynamoDB health check failed");
                false
            }
        }
    }
}
