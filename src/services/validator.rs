//! API key validation
//!
//! Validates candidate keys against the credential store using secure hash
//! comparison. The plaintext key is hashed with SHA-256 and the digest is
//! compared against each stored hash in constant time, so neither the store
//! nor the comparison ever sees where two keys first differ.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::models::ApiKeyRecord;
use crate::db::store::{CredentialStore, StoreError};

/// Fixed prefix identifying a bearer token as an API key.
pub const KEY_PREFIX: &str = "ak_";

/// Number of hex characters following the prefix.
pub const KEY_SECRET_LEN: usize = 64;

/// Validates API keys for one service instance.
pub struct KeyValidator {
    store: Arc<dyn CredentialStore>,
    service_id: String,
}

impl KeyValidator {
    pub fn new(store: Arc<dyn CredentialStore>, service_id: impl Into<String>) -> Self {
        Self {
            store,
            service_id: service_id.into(),
        }
    }

    /// SHA-256 hex digest of the full key material (prefix included).
    pub fn hash_key(candidate: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(candidate.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Strict format check: `ak_` followed by exactly 64 lowercase hex chars.
    ///
    /// Runs before any store query so obviously-malformed candidates never
    /// generate load against the store.
    pub fn is_well_formed(candidate: &str) -> bool {
        match candidate.strip_prefix(KEY_PREFIX) {
            Some(secret) => {
                secret.len() == KEY_SECRET_LEN
                    && secret.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
            }
            None => false,
        }
    }

    /// Validate a candidate key against the store.
    ///
    /// Returns `Ok(Some(record))` for a matching, active, non-expired key and
    /// `Ok(None)` for anything else the caller should treat as an invalid
    /// credential. Store failures are surfaced separately so callers can tell
    /// "invalid key" apart from "validator unavailable".
    pub async fn validate(
        &self,
        candidate: &str,
    ) -> Result<Option<ApiKeyRecord>, StoreError> {
        if !Self::is_well_formed(candidate) {
            tracing::debug!(service_id = %self.service_id, "Rejected malformed API key");
            return Ok(None);
        }

        let candidate_hash = Self::hash_key(candidate);
        let records = self.store.active_keys_for_service(&self.service_id).await?;
        let now = Utc::now();

        for record in records {
            if !secure_compare(&candidate_hash, &record.key_hash) {
                continue;
            }

            // Hash matched; expiry is checked only now so a stale record
            // still counts as "not found" to the caller.
            if record.is_expired(now) {
                tracing::warn!(
                    service_id = %self.service_id,
                    key_id = %record.id,
                    "Expired API key presented"
                );
                return Ok(None);
            }

            tracing::debug!(
                service_id = %self.service_id,
                key_id = %record.id,
                "API key authenticated"
            );
            return Ok(Some(record));
        }

        tracing::warn!(service_id = %self.service_id, "Invalid API key presented");
        Ok(None)
    }
}

/// Constant-time equality for two hex digests.
///
/// Unequal lengths reject immediately; digests are fixed-length, so length
/// reveals nothing about key material. Equal-length inputs are compared by
/// aggregating the bitwise difference across every byte without
/// short-circuiting on the first mismatch.
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::KeyStatus;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::sync::Mutex;

    struct FakeStore {
        keys: Mutex<Vec<ApiKeyRecord>>,
        fail: bool,
    }

    impl FakeStore {
        fn with_keys(keys: Vec<ApiKeyRecord>) -> Arc<Self> {
            Arc::new(Self {
                keys: Mutex::new(keys),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                keys: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl CredentialStore for FakeStore {
        async fn active_keys_for_service(
            &self,
            service_id: &str,
        ) -> Result<Vec<ApiKeyRecord>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            Ok(self
                .keys
                .lock()
                .unwrap()
                .iter()
                .filter(|k| k.service_id == service_id && k.status == KeyStatus::Active)
                .cloned()
                .collect())
        }

        async fn record_authentication(
            &self,
            _key_id: &str,
            _at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn append_usage_log(
            &self,
            _entry: &crate::db::models::UsageLogEntry,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn apply_billing_delta(
            &self,
            _service_id: &str,
            _delta: &crate::db::store::BillingDelta,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn key_by_id(&self, key_id: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
            Ok(self
                .keys
                .lock()
                .unwrap()
                .iter()
                .find(|k| k.id == key_id)
                .cloned())
        }

        async fn usage_entries_for_key(
            &self,
            _key_id: &str,
            _limit: i32,
        ) -> Result<Vec<crate::db::models::UsageLogEntry>, StoreError> {
            Ok(Vec::new())
        }

        async fn billing_summary(
            &self,
            _service_id: &str,
        ) -> Result<Option<crate::db::models::BillingSummary>, StoreError> {
            Ok(None)
        }
    }

    fn stored_key(plaintext: &str, service_id: &str) -> ApiKeyRecord {
        ApiKeyRecord {
            id: "key_01".to_string(),
            key_hash: KeyValidator::hash_key(plaintext),
            service_id: service_id.to_string(),
            status: KeyStatus::Active,
            created_by: "user-1".to_string(),
            organization_id: None,
            name: "test".to_string(),
            rate_limit: 100,
            expires_at: None,
            total_calls: 0,
            last_used: None,
            created_at: Utc::now(),
        }
    }

    fn test_key() -> String {
        format!("{}{}", KEY_PREFIX, "ab12".repeat(16))
    }

    #[test]
    fn test_well_formed() {
        assert!(KeyValidator::is_well_formed(&test_key()));
        assert!(!KeyValidator::is_well_formed("sk-something-else"));
        assert!(!KeyValidator::is_well_formed("ak_short"));
        // uppercase hex is rejected
        assert!(!KeyValidator::is_well_formed(&format!("ak_{}", "AB12".repeat(16))));
        // non-hex characters are rejected
        assert!(!KeyValidator::is_well_formed(&format!("ak_{}", "zz12".repeat(16))));
        assert!(!KeyValidator::is_well_formed(""));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let digest = KeyValidator::hash_key(&test_key());
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));
        // deterministic
        assert_eq!(digest, KeyValidator::hash_key(&test_key()));
    }

    #[test]
    fn test_secure_compare() {
        assert!(secure_compare("abcd", "abcd"));
        assert!(!secure_compare("abcd", "abce"));
        assert!(!secure_compare("abcd", "abcde"));
        assert!(secure_compare("", ""));
    }

    #[tokio::test]
    async fn test_validate_correct_key() {
        let key = test_key();
        let store = FakeStore::with_keys(vec![stored_key(&key, "agent-1")]);
        let validator = KeyValidator::new(store, "agent-1");

        let record = validator.validate(&key).await.unwrap();
        assert_eq!(record.unwrap().id, "key_01");
    }

    #[tokio::test]
    async fn test_validate_single_char_mutation() {
        let key = test_key();
        let store = FakeStore::with_keys(vec![stored_key(&key, "agent-1")]);
        let validator = KeyValidator::new(store, "agent-1");

        // Flip one hex char anywhere in the secret
        let mut mutated = key.into_bytes();
        let last = mutated.len() - 1;
        mutated[last] = if mutated[last] == b'2' { b'3' } else { b'2' };
        let mutated = String::from_utf8(mutated).unwrap();

        assert!(validator.validate(&mutated).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_wrong_service() {
        let key = test_key();
        let store = FakeStore::with_keys(vec![stored_key(&key, "agent-1")]);
        let validator = KeyValidator::new(store, "agent-2");

        assert!(validator.validate(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_expired_key() {
        let key = test_key();
        let mut record = stored_key(&key, "agent-1");
        record.expires_at = Some(Utc::now() - Duration::seconds(1));
        let store = FakeStore::with_keys(vec![record]);
        let validator = KeyValidator::new(store, "agent-1");

        // Hash matches, but the record is expired
        assert!(validator.validate(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_store_failure_is_not_not_found() {
        let validator = KeyValidator::new(FakeStore::failing(), "agent-1");
        let err = validator.validate(&test_key()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_malformed_key_skips_store() {
        // A failing store proves the short-circuit: malformed input must
        // return None without ever querying.
        let validator = KeyValidator::new(FakeStore::failing(), "agent-1");
        assert!(validator.validate("ak_nothex").await.unwrap().is_none());
    }
}
