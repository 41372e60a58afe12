//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction.

use crate::config::{create_dynamodb_client, Settings};
use crate::db::{CredentialStore, DynamoCredentialStore, DynamoDbClient};
use crate::services::{FixedWindowLimiter, KeyValidator, UsageTracker, UsageTrackerHandle};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
///
/// Holds all shared resources handlers and middleware need. Cheaply
/// cloneable (via Arc) and thread-safe.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// DynamoDB client for health checks
    pub dynamodb: Arc<DynamoDbClient>,

    /// Credential store boundary
    pub store: Arc<dyn CredentialStore>,

    /// Key validator for this service instance
    pub validator: Arc<KeyValidator>,

    /// Process-local rate-limit windows, constructed once at startup
    pub limiter: Arc<FixedWindowLimiter>,

    /// Sending half of the accounting queue
    pub usage: UsageTrackerHandle,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state
    ///
    /// Initializes the DynamoDB client, the credential store, the validator
    /// and limiter, and spawns the detached usage-accounting worker.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let start_time = Instant::now();

        tracing::debug!(
            region = %settings.aws_region,
            dynamodb_endpoint = ?settings.dynamodb_endpoint_url,
            "Initializing AWS SDK client"
        );
        let dynamodb_sdk_client = create_dynamodb_client(&settings).await;
        let dynamodb = Arc::new(DynamoDbClient::new(settings.clone(), dynamodb_sdk_client));

        let store: Arc<dyn CredentialStore> =
            Arc::new(DynamoCredentialStore::new(dynamodb.clone()));

        let validator = Arc::new(KeyValidator::new(store.clone(), settings.service_id.clone()));
        let limiter = Arc::new(FixedWindowLimiter::new());

        tracing::debug!(
            queue_capacity = settings.usage_queue_capacity,
            "Spawning usage tracker worker"
        );
        let (usage, _worker) = UsageTracker::spawn(store.clone(), settings.usage_queue_capacity);

        tracing::info!(
            service_id = %settings.service_id,
            "Application state initialized"
        );

        Ok(Self {
            settings,
            dynamodb,
            store,
            validator,
            limiter,
            usage,
            start_time,
        })
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check credential store connectivity
    pub async fn check_store_health(&self) -> bool {
        self.dynamodb.health_check().await
    }
}
