//! Usage tracking service
//!
//! Records per-request usage for billing and analytics: call counters on the
//! key record, append-only audit log entries, and billing rollups for
//! cost-bearing requests.
//!
//! The middleware never awaits these writes. It enqueues a `UsageEvent` onto
//! a bounded channel; a detached worker drains the channel and talks to the
//! store. A slow store therefore delays accounting, never responses, and a
//! full queue drops events (at-most-once accounting, undercounting accepted).

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::models::UsageLogEntry;
use crate::db::store::{BillingDelta, CredentialStore, StoreError};

/// Default bound on the accounting queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Everything the tracker needs to account for one forwarded request.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub key_id: String,
    pub service_id: String,
    pub request_path: String,
    pub method: String,
    pub response_status: u16,
    pub tokens_used: i64,
    pub cost_usd: f64,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Sending half handed to the middleware.
///
/// `submit` never blocks and never fails the caller: a full queue logs a
/// warning and drops the event.
#[derive(Clone)]
pub struct UsageTrackerHandle {
    tx: mpsc::Sender<UsageEvent>,
}

impl UsageTrackerHandle {
    pub fn submit(&self, event: UsageEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "Usage event dropped, accounting queue full or closed");
        }
    }
}

/// Service that applies usage events to the credential store.
#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<dyn CredentialStore>,
}

impl UsageTracker {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Spawn the accounting worker and return the handle the middleware
    /// submits events through. The worker exits when every handle is dropped.
    pub fn spawn(
        store: Arc<dyn CredentialStore>,
        queue_capacity: usize,
    ) -> (UsageTrackerHandle, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<UsageEvent>(queue_capacity);
        let tracker = Self::new(store);

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tracker.track(event).await;
            }
            tracing::debug!("Usage tracker worker stopped");
        });

        (UsageTrackerHandle { tx }, worker)
    }

    /// Apply one usage event. Failures are logged and swallowed; they must
    /// never propagate back to a request path.
    pub async fn track(&self, event: UsageEvent) {
        let key_id = event.key_id.clone();
        if let Err(e) = self.track_inner(event).await {
            tracing::error!(key_id = %key_id, error = %e, "Failed to track usage");
        }
    }

    async fn track_inner(&self, event: UsageEvent) -> Result<(), StoreError> {
        let now = Utc::now();

        // Counter touch first: total_calls/last_used move even if the log
        // write below fails.
        self.store.record_authentication(&event.key_id, now).await?;

        let entry = UsageLogEntry {
            id: format!("log_{}", Uuid::new_v4().simple()),
            key_id: event.key_id.clone(),
            service_id: event.service_id.clone(),
            request_path: event.request_path,
            method: event.method,
            timestamp: now,
            response_status: event.response_status,
            tokens_used: event.tokens_used,
            cost_usd: event.cost_usd,
            user_id: event.user_id,
            organization_id: event.organization_id,
            duration_ms: event.duration_ms,
        };
        self.store.append_usage_log(&entry).await?;

        if event.cost_usd > 0.0 {
            let delta = BillingDelta {
                messages: 1,
                tokens: event.tokens_used,
                cost_usd: event.cost_usd,
                api_key_requests: 1,
                at: now,
            };
            self.store.apply_billing_delta(&event.service_id, &delta).await?;
        }

        tracing::debug!(
            key_id = %event.key_id,
            service_id = %event.service_id,
            tokens_used = event.tokens_used,
            cost_usd = event.cost_usd,
            "Usage tracked"
        );

        Ok(())
    }
}
