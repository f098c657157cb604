//! `SeaORM` implementation of the `ApiKeyService` trait.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::constants::api_keys::{DEFAULT_KEY_NAME, KEY_PREFIX, KEY_RANDOM_BYTES};
use crate::db::{ApiKeyRecord, ApiKeyStats, Store, parse_timestamp};
use crate::models::identity::{AuthMethod, Identity};
use crate::services::api_key_service::{ApiKeyService, ApiKeyView, expiry_from_days};
use crate::services::error::AccessError;

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rand::rng().fill(&mut bytes);

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{KEY_PREFIX}{hex}")
}

fn is_expired(record: &ApiKeyRecord, now: DateTime<Utc>) -> bool {
    match record.expires_at.as_deref() {
        None => false,
        // An unreadable expiry fails closed.
        Some(raw) => parse_timestamp(raw).is_none_or(|expires_at| expires_at < now),
    }
}

pub struct SeaOrmApiKeyService {
    store: Store,
}

impl SeaOrmApiKeyService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn insert(
        &self,
        user_id: &str,
        name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        let expires_at = expiry_from_days(expires_in_days, Utc::now())?;

        if self.store.count_active_api_keys(user_id).await? >= 1 {
            return Err(AccessError::MaxKeysReached);
        }

        let record = self
            .store
            .insert_api_key(user_id, name, &generate_key(), expires_at)
            .await?
            // Lost the race against a concurrent create.
            .ok_or(AccessError::MaxKeysReached)?;

        info!(user_id = %user_id, key_id = %record.id, "API key created");
        Ok(ApiKeyView::revealed(record))
    }

    /// Loads a live key and checks that `user_id` owns it.
    async fn owned_key(&self, user_id: &str, key_id: &str) -> Result<ApiKeyRecord, AccessError> {
        let record = self
            .store
            .get_api_key(key_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("API key".to_string()))?;

        if record.user_id != user_id {
            warn!(user_id = %user_id, key_id = %key_id, "API key owned by another user");
            return Err(AccessError::PermissionDenied);
        }

        Ok(record)
    }

    async fn set_expiry(
        &self,
        record: ApiKeyRecord,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        let expires_at = expiry_from_days(expires_in_days, Utc::now())?;
        self.store.set_api_key_expiry(&record.id, expires_at).await?;

        let updated = self
            .store
            .get_api_key(&record.id)
            .await?
            .ok_or_else(|| AccessError::NotFound("API key".to_string()))?;
        Ok(ApiKeyView::masked(updated))
    }
}

#[async_trait::async_trait]
impl ApiKeyService for SeaOrmApiKeyService {
    async fn create(
        &self,
        user_id: &str,
        name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 255 {
            return Err(AccessError::Validation(
                "Key name must be between 1 and 255 characters".to_string(),
            ));
        }

        self.insert(user_id, name, expires_in_days).await
    }

    async fn create_for_user(
        &self,
        user_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AccessError::NotFound("User".to_string()));
        }

        let expired = self
            .store
            .deactivate_expired_api_keys(user_id, Utc::now())
            .await?;
        if expired > 0 {
            debug!(user_id = %user_id, count = expired, "Deactivated expired API keys");
        }

        self.insert(user_id, DEFAULT_KEY_NAME, expires_in_days).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ApiKeyView>, AccessError> {
        let keys = self.store.list_api_keys(user_id).await?;
        Ok(keys.into_iter().map(ApiKeyView::masked).collect())
    }

    async fn current(&self, user_id: &str) -> Result<ApiKeyView, AccessError> {
        self.store
            .list_api_keys(user_id)
            .await?
            .into_iter()
            .find(|k| k.is_active)
            .map(ApiKeyView::revealed)
            .ok_or_else(|| AccessError::NotFound("API key".to_string()))
    }

    async fn stats(&self, user_id: &str) -> Result<ApiKeyStats, AccessError> {
        Ok(self.store.api_key_stats(user_id).await?)
    }

    async fn validate_at(
        &self,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AccessError> {
        if secret.is_empty() {
            return Err(AccessError::InvalidKey);
        }

        let record = self
            .store
            .get_active_api_key_by_secret(secret)
            .await?
            .ok_or(AccessError::InvalidKey)?;

        if is_expired(&record, now) {
            debug!(key_id = %record.id, "Rejected expired API key");
            return Err(AccessError::InvalidKey);
        }

        let user = self
            .store
            .get_user(&record.user_id)
            .await?
            .ok_or(AccessError::InvalidKey)?;

        let store = self.store.clone();
        let key_id = record.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(&key_id, Utc::now()).await {
                warn!(key_id = %key_id, error = %e, "Failed to record API key usage");
            }
        });

        Ok(Identity {
            user_id: user.id,
            auth_center_user_id: user.auth_center_user_id,
            method: AuthMethod::ApiKey,
        })
    }

    async fn deactivate(&self, user_id: &str, key_id: &str) -> Result<(), AccessError> {
        let record = self.owned_key(user_id, key_id).await?;
        self.store.deactivate_api_key(&record.id).await?;
        info!(user_id = %user_id, key_id = %key_id, "API key deactivated");
        Ok(())
    }

    async fn delete(&self, user_id: &str, key_id: &str) -> Result<(), AccessError> {
        let record = self.owned_key(user_id, key_id).await?;
        self.store.soft_delete_api_key(&record.id, Utc::now()).await?;
        info!(user_id = %user_id, key_id = %key_id, "API key deleted");
        Ok(())
    }

    async fn update_expiry(
        &self,
        user_id: &str,
        key_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        let record = self.owned_key(user_id, key_id).await?;
        self.set_expiry(record, expires_in_days).await
    }

    async fn admin_update_expiry(
        &self,
        key_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        let record = self
            .store
            .get_api_key(key_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("API key".to_string()))?;
        self.set_expiry(record, expires_in_days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::auth_center::ExternalProfile;
    use chrono::Duration;

    async fn setup() -> (SeaOrmApiKeyService, Store, String) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let (user, _) = store
            .insert_user_if_absent("ext-1", &ExternalProfile::default())
            .await
            .unwrap();
        (SeaOrmApiKeyService::new(store.clone()), store, user.id)
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert!(key.starts_with("eb_"));
        assert_eq!(key.len(), 3 + KEY_RANDOM_BYTES * 2);
        assert_ne!(key, generate_key());
    }

    #[tokio::test]
    async fn test_single_active_key() {
        let (service, _, user_id) = setup().await;

        let first = service.create(&user_id, "plugin", None).await.unwrap();
        assert!(first.key.starts_with("eb_"));

        for _ in 0..3 {
            let err = service.create(&user_id, "again", None).await.unwrap_err();
            assert!(matches!(err, AccessError::MaxKeysReached));
        }

        service.deactivate(&user_id, &first.id).await.unwrap();
        let second = service.create(&user_id, "again", None).await.unwrap();

        service.delete(&user_id, &second.id).await.unwrap();
        service.create(&user_id, "third", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unique_index_backs_the_invariant() {
        let (_, store, user_id) = setup().await;

        let first = store
            .insert_api_key(&user_id, "a", "eb_first_secret_value", None)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .insert_api_key(&user_id, "b", "eb_second_secret_value", None)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_expiry_window() {
        let (service, _, user_id) = setup().await;
        let key = service.create(&user_id, "plugin", Some(5)).await.unwrap();
        let now = Utc::now();

        let identity = service
            .validate_at(&key.key, now + Duration::days(4))
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.auth_center_user_id, "ext-1");
        assert_eq!(identity.method, AuthMethod::ApiKey);

        let err = service
            .validate_at(&key.key, now + Duration::days(6))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidKey));
    }

    #[tokio::test]
    async fn test_no_expiry_never_expires() {
        let (service, _, user_id) = setup().await;
        let key = service.create(&user_id, "plugin", Some(0)).await.unwrap();
        assert!(key.expires_at.is_none());

        service
            .validate_at(&key.key, Utc::now() + Duration::days(3650))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_unknown_and_inactive() {
        let (service, _, user_id) = setup().await;

        let err = service.validate("eb_nope").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidKey));

        let key = service.create(&user_id, "plugin", None).await.unwrap();
        service.deactivate(&user_id, &key.id).await.unwrap();
        let err = service.validate(&key.key).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidKey));
    }

    #[tokio::test]
    async fn test_validate_records_last_used() {
        let (service, store, user_id) = setup().await;
        let key = service.create(&user_id, "plugin", None).await.unwrap();

        service.validate(&key.key).await.unwrap();

        let mut last_used = None;
        for _ in 0..50 {
            last_used = store.get_api_key(&key.id).await.unwrap().unwrap().last_used;
            if last_used.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(last_used.is_some());
    }

    #[tokio::test]
    async fn test_listing_masks_secrets() {
        let (service, _, user_id) = setup().await;
        let created = service.create(&user_id, "plugin", None).await.unwrap();

        let listed = service.list(&user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].key, created.key);
        assert_eq!(listed[0].key, mask(&created.key));

        let current = service.current(&user_id).await.unwrap();
        assert_eq!(current.key, created.key);
    }

    fn mask(key: &str) -> String {
        crate::services::api_key_service::mask_api_key(key)
    }

    #[tokio::test]
    async fn test_current_without_key() {
        let (service, _, user_id) = setup().await;
        let err = service.current(&user_id).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ownership_checks() {
        let (service, store, user_id) = setup().await;
        let (other, _) = store
            .insert_user_if_absent("ext-2", &ExternalProfile::default())
            .await
            .unwrap();
        let key = service.create(&user_id, "plugin", None).await.unwrap();

        let err = service.deactivate(&other.id, &key.id).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied));

        let err = service.delete(&other.id, "missing").await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        let err = service
            .update_expiry(&other.id, &key.id, Some(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied));

        let updated = service.admin_update_expiry(&key.id, Some(3)).await.unwrap();
        assert!(updated.expires_at.is_some());
        let cleared = service
            .update_expiry(&user_id, &key.id, None)
            .await
            .unwrap();
        assert!(cleared.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_admin_reissue_after_expiry() {
        let (service, store, user_id) = setup().await;
        let past = Utc::now() - Duration::days(1);
        store
            .insert_api_key(&user_id, "old", "eb_expired_secret_value", Some(past))
            .await
            .unwrap()
            .unwrap();

        let err = service.create(&user_id, "mine", None).await.unwrap_err();
        assert!(matches!(err, AccessError::MaxKeysReached));

        let issued = service.create_for_user(&user_id, Some(30)).await.unwrap();
        assert_eq!(issued.name, DEFAULT_KEY_NAME);
        assert_eq!(service.stats(&user_id).await.unwrap().active_count, 1);
        assert_eq!(service.stats(&user_id).await.unwrap().total_count, 2);
    }

    #[tokio::test]
    async fn test_admin_create_for_unknown_user() {
        let (service, _, _) = setup().await;
        let err = service.create_for_user("nobody", None).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }
}
