//! Domain service for machine credentials.
//!
//! A user holds at most one active key. Secrets are shown in full on
//! creation and to their owner through [`ApiKeyService::current`]; every
//! listing masks them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::api_keys::MAX_EXPIRY_DAYS;
use crate::db::{ApiKeyRecord, ApiKeyStats};
use crate::models::identity::Identity;
use crate::services::error::AccessError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyView {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub key: String,
    pub is_active: bool,
    pub last_used: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
}

impl ApiKeyView {
    #[must_use]
    pub fn revealed(record: ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            key: record.key,
            is_active: record.is_active,
            last_used: record.last_used,
            expires_at: record.expires_at,
            created_at: record.created_at,
        }
    }

    #[must_use]
    pub fn masked(record: ApiKeyRecord) -> Self {
        let key = mask_api_key(&record.key);
        Self {
            key,
            ..Self::revealed(record)
        }
    }
}

/// Keeps the first 8 and last 4 characters. Short secrets are replaced
/// entirely.
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    use crate::constants::api_keys::{FULL_MASK, MIN_MASKABLE_LEN};

    let chars: Vec<char> = key.chars().collect();
    if chars.len() < MIN_MASKABLE_LEN {
        return FULL_MASK.to_string();
    }

    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// `Some(days)` with `days > 0` sets an expiry that far from `now`; anything
/// else means the key never expires.
///
/// # Errors
///
/// Returns [`AccessError::Validation`] when `days` exceeds
/// [`MAX_EXPIRY_DAYS`].
pub fn expiry_from_days(
    days: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, AccessError> {
    let Some(days) = days.filter(|d| *d > 0) else {
        return Ok(None);
    };

    if days > MAX_EXPIRY_DAYS {
        return Err(AccessError::Validation(format!(
            "Expiry must be at most {MAX_EXPIRY_DAYS} days"
        )));
    }

    chrono::Duration::try_days(days)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(Some)
        .ok_or_else(|| AccessError::Validation("Expiry is out of range".to_string()))
}

#[async_trait::async_trait]
pub trait ApiKeyService: Send + Sync {
    /// Issues a new key and returns it unmasked.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::MaxKeysReached`] if the user already holds an
    /// active key.
    async fn create(
        &self,
        user_id: &str,
        name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError>;

    /// Administrative issue on a user's behalf. Expired active keys are
    /// deactivated first so a stale key never blocks re-issuance.
    async fn create_for_user(
        &self,
        user_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError>;

    async fn list(&self, user_id: &str) -> Result<Vec<ApiKeyView>, AccessError>;

    /// The caller's active key, unmasked.
    async fn current(&self, user_id: &str) -> Result<ApiKeyView, AccessError>;

    async fn stats(&self, user_id: &str) -> Result<ApiKeyStats, AccessError>;

    async fn validate(&self, secret: &str) -> Result<Identity, AccessError> {
        self.validate_at(secret, Utc::now()).await
    }

    /// Resolves a presented secret. Recording last-used happens in the
    /// background and never affects the result.
    async fn validate_at(&self, secret: &str, now: DateTime<Utc>)
    -> Result<Identity, AccessError>;

    async fn deactivate(&self, user_id: &str, key_id: &str) -> Result<(), AccessError>;

    async fn delete(&self, user_id: &str, key_id: &str) -> Result<(), AccessError>;

    async fn update_expiry(
        &self,
        user_id: &str,
        key_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError>;

    /// Same as [`Self::update_expiry`] without the ownership check.
    async fn admin_update_expiry(
        &self,
        key_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError>;
}
