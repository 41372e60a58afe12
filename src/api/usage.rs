//! Usage introspection endpoints
//!
//! Read-only views over the same store the accounting worker writes to:
//! the calling key's counters and recent audit log entries, and the
//! service-level billing rollup.

use axum::{
    extract::{FromRef, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::models::{BillingSummary, UsageLogEntry};
use crate::db::store::CredentialStore;
use crate::error::ApiError;
use crate::middleware::auth::ApiKeyIdentity;
use crate::server::state::AppState;

/// How many audit log entries the recent-usage view returns.
const RECENT_ENTRIES_LIMIT: i32 = 50;

/// State slice the usage handlers need.
#[derive(Clone)]
pub struct UsageQueryState {
    pub store: Arc<dyn CredentialStore>,
    pub service_id: String,
}

impl FromRef<AppState> for UsageQueryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            service_id: state.settings.service_id.clone(),
        }
    }
}

/// Counters and limits from the calling key's record
#[derive(Debug, Serialize)]
pub struct KeyStats {
    pub key_id: String,
    pub name: String,
    pub rate_limit: u32,
    pub total_calls: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RecentUsageResponse {
    pub key: KeyStats,
    pub entries: Vec<UsageLogEntry>,
}

#[derive(Serialize)]
pub struct UsageSummaryResponse {
    pub service_id: String,
    /// Absent until the first cost-bearing event creates the rollup row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BillingSummary>,
}

/// Recent usage for the calling key
///
/// GET /api/usage/recent
pub async fn recent_usage(
    State(state): State<UsageQueryState>,
    identity: Option<Extension<ApiKeyIdentity>>,
) -> Result<Json<RecentUsageResponse>, ApiError> {
    let Extension(identity) = require_identity(identity)?;

    let record = state
        .store
        .key_by_id(&identity.key_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or inactive API key".to_string()))?;

    let entries = state
        .store
        .usage_entries_for_key(&identity.key_id, RECENT_ENTRIES_LIMIT)
        .await?;

    Ok(Json(RecentUsageResponse {
        key: KeyStats {
            key_id: record.id,
            name: record.name,
            rate_limit: record.rate_limit,
            total_calls: record.total_calls,
            last_used: record.last_used,
            expires_at: record.expires_at,
        },
        entries,
    }))
}

/// Billing rollup for the service this gateway fronts
///
/// GET /api/usage/summary
pub async fn usage_summary(
    State(state): State<UsageQueryState>,
    identity: Option<Extension<ApiKeyIdentity>>,
) -> Result<Json<UsageSummaryResponse>, ApiError> {
    require_identity(identity)?;

    let summary = state.store.billing_summary(&state.service_id).await?;

    Ok(Json(UsageSummaryResponse {
        service_id: state.service_id,
        summary,
    }))
}

/// These views are per-key, so anonymous pass-through callers get a 401
/// instead of someone else's data.
fn require_identity(
    identity: Option<Extension<ApiKeyIdentity>>,
) -> Result<Extension<ApiKeyIdentity>, ApiError> {
    identity.ok_or_else(|| ApiError::Unauthorized("API key required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ApiKeyRecord, KeyStatus};
    use crate::db::store::{BillingDelta, StoreError};
    use crate::middleware::auth::AUTH_METHOD_API_KEY;
    use async_trait::async_trait;

    #[derive(Default)]
    struct StatsStore {
        key: Option<ApiKeyRecord>,
        entries: Vec<UsageLogEntry>,
        summary: Option<BillingSummary>,
    }

    #[async_trait]
    impl CredentialStore for StatsStore {
        async fn active_keys_for_service(
            &self,
            _service_id: &str,
        ) -> Result<Vec<ApiKeyRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn record_authentication(
            &self,
            _key_id: &str,
            _at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn append_usage_log(&self, _entry: &UsageLogEntry) -> Result<(), StoreError> {
            Ok(())
        }

        async fn apply_billing_delta(
            &self,
            _service_id: &str,
            _delta: &BillingDelta,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn key_by_id(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
            Ok(self.key.clone().filter(|k| k.id == key_id))
        }

        async fn usage_entries_for_key(
            &self,
            _key_id: &str,
            limit: i32,
        ) -> Result<Vec<UsageLogEntry>, StoreError> {
            Ok(self.entries.iter().take(limit as usize).cloned().collect())
        }

        async fn billing_summary(
            &self,
            _service_id: &str,
        ) -> Result<Option<BillingSummary>, StoreError> {
            Ok(self.summary.clone())
        }
    }

    fn state_with(store: StatsStore) -> UsageQueryState {
        UsageQueryState {
            store: Arc::new(store),
            service_id: "agent-1".to_string(),
        }
    }

    fn identity() -> Extension<ApiKeyIdentity> {
        Extension(ApiKeyIdentity {
            key_id: "key_01".to_string(),
            user_id: "user-1".to_string(),
            organization_id: None,
            auth_method: AUTH_METHOD_API_KEY,
        })
    }

    fn key_record() -> ApiKeyRecord {
        ApiKeyRecord {
            id: "key_01".to_string(),
            key_hash: "a".repeat(64),
            service_id: "agent-1".to_string(),
            status: KeyStatus::Active,
            created_by: "user-1".to_string(),
            organization_id: None,
            name: "stats".to_string(),
            rate_limit: 100,
            expires_at: None,
            total_calls: 7,
            last_used: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn log_entry(id: &str) -> UsageLogEntry {
        UsageLogEntry {
            id: id.to_string(),
            key_id: "key_01".to_string(),
            service_id: "agent-1".to_string(),
            request_path: "/api/conversation/message".to_string(),
            method: "POST".to_string(),
            timestamp: Utc::now(),
            response_status: 200,
            tokens_used: 42,
            cost_usd: 0.00084,
            user_id: Some("user-1".to_string()),
            organization_id: None,
            duration_ms: Some(12),
        }
    }

    #[tokio::test]
    async fn recent_usage_returns_key_stats_and_entries() {
        let state = state_with(StatsStore {
            key: Some(key_record()),
            entries: vec![log_entry("log_1"), log_entry("log_2")],
            summary: None,
        });

        let Json(body) = recent_usage(State(state), Some(identity())).await.unwrap();

        assert_eq!(body.key.key_id, "key_01");
        assert_eq!(body.key.total_calls, 7);
        assert_eq!(body.entries.len(), 2);
        assert_eq!(body.entries[0].id, "log_1");
    }

    #[tokio::test]
    async fn recent_usage_requires_identity() {
        let state = state_with(StatsStore::default());

        let err = recent_usage(State(state), None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn recent_usage_rejects_vanished_key() {
        // Identity attached but the record is gone (revoked mid-flight)
        let state = state_with(StatsStore::default());

        let err = recent_usage(State(state), Some(identity())).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn summary_reports_rollup_when_present() {
        let state = state_with(StatsStore {
            key: None,
            entries: Vec::new(),
            summary: Some(BillingSummary {
                service_id: "agent-1".to_string(),
                total_messages: 3,
                total_tokens: 126,
                total_cost: 0.00252,
                api_key_usage_count: 3,
                web_usage_count: 0,
                last_activity: Some(Utc::now()),
                created_at: Some(Utc::now()),
                updated_at: Some(Utc::now()),
            }),
        });

        let Json(body) = usage_summary(State(state), Some(identity())).await.unwrap();
        assert_eq!(body.service_id, "agent-1");
        let summary = body.summary.unwrap();
        assert_eq!(summary.total_messages, 3);
        assert_eq!(summary.total_tokens, 126);
    }

    #[tokio::test]
    async fn summary_absent_before_first_cost_event() {
        let state = state_with(StatsStore::default());

        let Json(body) = usage_summary(State(state), Some(identity())).await.unwrap();
        assert!(body.summary.is_none());
    }
}
