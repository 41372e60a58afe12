//! DynamoDB data models
//!
//! This module defines the data structures for the credential store tables.

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of an API key record.
///
/// Keys transition `active -> revoked` externally (console/admin tooling).
/// The gateway only ever reads this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(KeyStatus::Active),
            "revoked" => Some(KeyStatus::Revoked),
            _ => None,
        }
    }
}

/// One issued API key credential.
///
/// Stored in the api-keys table with `id` as partition key. The plaintext key
/// is never persisted; only the SHA-256 hex digest in `key_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Opaque identifier (partition key); also the rate-limit and tracking key
    pub id: String,

    /// SHA-256 hex digest of the full key material
    pub key_hash: String,

    /// The service instance this key authorizes
    pub service_id: String,

    /// Lifecycle status; only active keys are eligible for authentication
    pub status: KeyStatus,

    /// Principal that owns the key
    pub created_by: String,

    /// Optional tenant grouping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Human-readable name for the key
    pub name: String,

    /// Max requests per rolling minute
    pub rate_limit: u32,

    /// Optional expiry; absent means non-expiring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Monotonic usage counter, mutated only by the usage tracker
    pub total_calls: i64,

    /// Timestamp of the most recent successful authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,

    /// When the key was issued
    pub created_at: DateTime<Utc>,
}

/// Baseline per-key rate limit; configuration may override it.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

impl ApiKeyRecord {
    /// Whether the key has expired relative to `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    /// Parse from a DynamoDB item.
    ///
    /// `default_rate_limit` fills in records that carry no `rate_limit`
    /// attribute; it comes from configuration, not a hard-coded constant.
    pub fn from_dynamodb(
        item: &HashMap<String, AttributeValue>,
        default_rate_limit: u32,
    ) -> Option<Self> {
        Some(Self {
            id: get_string(item, "id")?,
            key_hash: get_string(item, "key_hash")?,
            service_id: get_string(item, "service_id")?,
            status: get_string(item, "status").and_then(|s| KeyStatus::parse(&s))?,
            created_by: get_string(item, "created_by").unwrap_or_default(),
            organization_id: get_string(item, "organization_id"),
            name: get_string(item, "name").unwrap_or_default(),
            rate_limit: get_number(item, "rate_limit")
                .map(|n| n as u32)
                .unwrap_or(default_rate_limit),
            expires_at: get_timestamp(item, "expires_at"),
            total_calls: get_number(item, "total_calls").unwrap_or(0),
            last_used: get_timestamp(item, "last_used"),
            created_at: get_timestamp(item, "created_at").unwrap_or_else(Utc::now),
        })
    }

    /// Convert to a DynamoDB item
    pub fn to_dynamodb(&self) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert("key_hash".to_string(), AttributeValue::S(self.key_hash.clone()));
        item.insert("service_id".to_string(), AttributeValue::S(self.service_id.clone()));
        item.insert("status".to_string(), AttributeValue::S(self.status.as_str().to_string()));
        item.insert("created_by".to_string(), AttributeValue::S(self.created_by.clone()));
        item.insert("name".to_string(), AttributeValue::S(self.name.clone()));
        item.insert("rate_limit".to_string(), AttributeValue::N(self.rate_limit.to_string()));
        item.insert("total_calls".to_string(), AttributeValue::N(self.total_calls.to_string()));
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(self.created_at.to_rfc3339()),
        );

        if let Some(ref org) = self.organization_id {
            item.insert("organization_id".to_string(), AttributeValue::S(org.clone()));
        }
        if let Some(expires_at) = self.expires_at {
            item.insert("expires_at".to_string(), AttributeValue::S(expires_at.to_rfc3339()));
        }
        if let Some(last_used) = self.last_used {
            item.insert("last_used".to_string(), AttributeValue::S(last_used.to_rfc3339()));
        }

        item
    }
}

/// One immutable audit record per successfully authenticated, forwarded request.
///
/// Stored in the usage-logs table with `key_id` as partition key and
/// `timestamp` as sort key. Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    /// Unique entry identifier
    pub id: String,

    /// API key that made the request (partition key)
    pub key_id: String,

    /// Service instance the key authorizes
    pub service_id: String,

    /// Request path as seen by the middleware
    pub request_path: String,

    /// HTTP method
    pub method: String,

    /// When the request completed (sort key, RFC 3339)
    pub timestamp: DateTime<Utc>,

    /// Status code of the forwarded response
    pub response_status: u16,

    /// Token count reported by the downstream handler (0 if not reported)
    pub tokens_used: i64,

    /// Cost reported by the downstream handler (0.0 if not reported)
    pub cost_usd: f64,

    /// Owning user of the key, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Tenant grouping, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Wall-clock handling time of the forwarded request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl UsageLogEntry {
    /// Convert to a DynamoDB item
    pub fn to_dynamodb(&self) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(self.id.clone()));
        item.insert("key_id".to_string(), AttributeValue::S(self.key_id.clone()));
        item.insert("service_id".to_string(), AttributeValue::S(self.service_id.clone()));
        item.insert("request_path".to_string(), AttributeValue::S(self.request_path.clone()));
        item.insert("method".to_string(), AttributeValue::S(self.method.clone()));
        item.insert(
            "timestamp".to_string(),
            AttributeValue::S(self.timestamp.to_rfc3339()),
        );
        item.insert(
            "response_status".to_string(),
            AttributeValue::N(self.response_status.to_string()),
        );
        item.insert("tokens_used".to_string(), AttributeValue::N(self.tokens_used.to_string()));
        item.insert("cost_usd".to_string(), AttributeValue::N(self.cost_usd.to_string()));

        if let Some(ref user_id) = self.user_id {
            item.insert("user_id".to_string(), AttributeValue::S(user_id.clone()));
        }
        if let Some(ref org) = self.organization_id {
            item.insert("organization_id".to_string(), AttributeValue::S(org.clone()));
        }
        if let Some(duration_ms) = self.duration_ms {
            item.insert("duration_ms".to_string(), AttributeValue::N(duration_ms.to_string()));
        }

        item
    }

    /// Parse from a DynamoDB item
    pub fn from_dynamodb(item: &HashMap<String, AttributeValue>) -> Option<Self> {
        Some(Self {
            id: get_string(item, "id")?,
            key_id: get_string(item, "key_id")?,
            service_id: get_string(item, "service_id").unwrap_or_default(),
            request_path: get_string(item, "request_path").unwrap_or_default(),
            method: get_string(item, "method").unwrap_or_default(),
            timestamp: get_timestamp(item, "timestamp")?,
            response_status: get_number(item, "response_status").unwrap_or(0) as u16,
            tokens_used: get_number(item, "tokens_used").unwrap_or(0),
            cost_usd: get_number_f64(item, "cost_usd").unwrap_or(0.0),
            user_id: get_string(item, "user_id"),
            organization_id: get_string(item, "organization_id"),
            duration_ms: get_number(item, "duration_ms"),
        })
    }
}

/// Per-service aggregate of usage and cost.
///
/// Stored in the usage-summary table with `service_id` as partition key.
/// Created lazily on the first cost-bearing event and thereafter updated by
/// atomic increment; the numeric fields carry commutative counter semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSummary {
    /// Service instance (partition key)
    pub service_id: String,

    /// Number of cost-bearing messages handled
    pub total_messages: i64,

    /// Tokens consumed across all messages
    pub total_tokens: i64,

    /// Accumulated cost in USD
    pub total_cost: f64,

    /// Requests authenticated with an API key
    pub api_key_usage_count: i64,

    /// Requests attributed to the web surface (written by other services)
    pub web_usage_count: i64,

    /// Most recent cost-bearing activity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BillingSummary {
    /// Parse from a DynamoDB item
    pub fn from_dynamodb(item: &HashMap<String, AttributeValue>) -> Option<Self> {
        Some(Self {
            service_id: get_string(item, "service_id")?,
            total_messages: get_number(item, "total_messages").unwrap_or(0),
            total_tokens: get_number(item, "total_tokens").unwrap_or(0),
            total_cost: get_number_f64(item, "total_cost").unwrap_or(0.0),
            api_key_usage_count: get_number(item, "api_key_usage_count").unwrap_or(0),
            web_usage_count: get_number(item, "web_usage_count").unwrap_or(0),
            last_activity: get_timestamp(item, "last_activity"),
            created_at: get_timestamp(item, "created_at"),
            updated_at: get_timestamp(item, "updated_at"),
        })
    }
}

// Helper functions for parsing DynamoDB AttributeValues

fn get_string(item: &HashMap<String, AttributeValue>, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn get_number(item: &HashMap<String, AttributeValue>, key: &str) -> Option<i64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn get_number_f64(item: &HashMap<String, AttributeValue>, key: &str) -> Option<f64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn get_timestamp(item: &HashMap<String, AttributeValue>, key: &str) -> Option<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_key() -> ApiKeyRecord {
        ApiKeyRecord {
            id: "key_01".to_string(),
            key_hash: "a".repeat(64),
            service_id: "agent-1".to_string(),
            status: KeyStatus::Active,
            created_by: "user-1".to_string(),
            organization_id: Some("org-1".to_string()),
            name: "Test Key".to_string(),
            rate_limit: 100,
            expires_at: None,
            total_calls: 0,
            last_used: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_key_status_parse() {
        assert_eq!(KeyStatus::parse("active"), Some(KeyStatus::Active));
        assert_eq!(KeyStatus::parse("revoked"), Some(KeyStatus::Revoked));
        assert_eq!(KeyStatus::parse("disabled"), None);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut key = sample_key();
        assert!(!key.is_expired(now), "no expiry means never expired");

        key.expires_at = Some(now - Duration::seconds(1));
        assert!(key.is_expired(now));

        key.expires_at = Some(now + Duration::hours(1));
        assert!(!key.is_expired(now));
    }

    #[test]
    fn test_api_key_record_round_trip() {
        let key = sample_key();
        let item = key.to_dynamodb();
        let parsed = ApiKeyRecord::from_dynamodb(&item, DEFAULT_RATE_LIMIT).unwrap();

        assert_eq!(parsed.id, key.id);
        assert_eq!(parsed.key_hash, key.key_hash);
        assert_eq!(parsed.status, KeyStatus::Active);
        assert_eq!(parsed.rate_limit, 100);
        assert_eq!(parsed.organization_id.as_deref(), Some("org-1"));
    }

    #[test]
    fn test_rate_limit_falls_back_to_configured_default() {
        let mut item = sample_key().to_dynamodb();
        item.remove("rate_limit");

        // Whatever default the caller configures wins, not a fixed constant
        let parsed = ApiKeyRecord::from_dynamodb(&item, 250).unwrap();
        assert_eq!(parsed.rate_limit, 250);
    }

    #[test]
    fn test_stored_rate_limit_beats_default() {
        let item = sample_key().to_dynamodb();
        let parsed = ApiKeyRecord::from_dynamodb(&item, 250).unwrap();
        assert_eq!(parsed.rate_limit, 100);
    }

    #[test]
    fn test_usage_log_entry_round_trip() {
        let entry = UsageLogEntry {
            id: "log_01".to_string(),
            key_id: "k1".to_string(),
            service_id: "agent-1".to_string(),
            request_path: "/api/conversation/message".to_string(),
            method: "POST".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            response_status: 200,
            tokens_used: 42,
            cost_usd: 0.00084,
            user_id: Some("user-1".to_string()),
            organization_id: None,
            duration_ms: Some(120),
        };

        let parsed = UsageLogEntry::from_dynamodb(&entry.to_dynamodb()).unwrap();
        assert_eq!(parsed, entry);
    }
}
