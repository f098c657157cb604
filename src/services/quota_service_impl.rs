//! `SeaORM` implementation of the `QuotaService` trait.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info};

use crate::config::QuotaConfig;
use crate::db::{Settings, SettingsPatch, Store};
use crate::services::error::AccessError;
use crate::services::quota_service::{QuotaService, SettingsWithUsage, day_window, decide};

pub struct SeaOrmQuotaService {
    store: Store,
    defaults: QuotaConfig,
    offset: FixedOffset,
}

impl SeaOrmQuotaService {
    #[must_use]
    pub const fn new(store: Store, defaults: QuotaConfig, offset: FixedOffset) -> Self {
        Self {
            store,
            defaults,
            offset,
        }
    }

    fn reject(user_id: &str, err: AccessError) -> AccessError {
        metrics::counter!("quota_rejections_total", "kind" => err.kind()).increment(1);
        debug!(user_id = %user_id, kind = err.kind(), "Quota rejected write");
        err
    }
}

#[async_trait::async_trait]
impl QuotaService for SeaOrmQuotaService {
    async fn check_at(
        &self,
        user_id: &str,
        requested: usize,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        let settings = self.settings(user_id).await?;
        if !settings.collection_enabled {
            return Err(Self::reject(user_id, AccessError::CollectionDisabled));
        }

        let used = self.used_today(user_id, now).await?;
        decide(&settings, used, requested).map_err(|e| Self::reject(user_id, e))
    }

    async fn ensure_enabled(&self, user_id: &str) -> Result<(), AccessError> {
        if self.settings(user_id).await?.collection_enabled {
            Ok(())
        } else {
            Err(Self::reject(user_id, AccessError::CollectionDisabled))
        }
    }

    async fn settings(&self, user_id: &str) -> Result<Settings, AccessError> {
        Ok(self
            .store
            .get_settings(user_id)
            .await?
            .unwrap_or_else(|| Settings::defaults(user_id, &self.defaults)))
    }

    async fn settings_with_usage(&self, user_id: &str) -> Result<SettingsWithUsage, AccessError> {
        let settings = self.settings(user_id).await?;
        let today_count = self.used_today(user_id, Utc::now()).await?;
        let limit = u64::try_from(settings.collection_daily_limit).unwrap_or(0);

        Ok(SettingsWithUsage {
            settings,
            today_count,
            remaining_today: limit.saturating_sub(today_count),
        })
    }

    async fn used_today(&self, user_id: &str, now: DateTime<Utc>) -> Result<u64, AccessError> {
        let (start, end) = day_window(now, self.offset);
        Ok(self
            .store
            .count_notes_created_between(user_id, start, end)
            .await?)
    }

    async fn set_enabled(&self, user_id: &str, enabled: bool) -> Result<Settings, AccessError> {
        let settings = self
            .store
            .set_collection_enabled(user_id, enabled, &self.defaults)
            .await?;
        info!(user_id = %user_id, enabled, "Collection toggled");
        Ok(settings)
    }

    async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Settings, AccessError> {
        if patch.is_empty() {
            return Err(AccessError::Validation(
                "At least one setting must be provided".to_string(),
            ));
        }

        let settings = self
            .store
            .apply_settings_patch(user_id, patch, &self.defaults)
            .await?;
        info!(
            user_id = %user_id,
            daily_limit = settings.collection_daily_limit,
            batch_limit = settings.collection_batch_limit,
            enabled = settings.collection_enabled,
            "Collection settings updated"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::auth_center::ExternalProfile;
    use crate::models::content::{NewNote, NoteSource};

    fn note(i: usize) -> NewNote {
        serde_json::from_value(serde_json::json!({
            "url": format!("https://example.com/n/{i}"),
            "captureTimestamp": 0
        }))
        .unwrap()
    }

    async fn setup() -> (SeaOrmQuotaService, Store, String) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let (user, _) = store
            .insert_user_if_absent("ext-1", &ExternalProfile::default())
            .await
            .unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        let service = SeaOrmQuotaService::new(store.clone(), QuotaConfig::default(), offset);
        (service, store, user.id)
    }

    async fn seed(store: &Store, user_id: &str, count: usize) {
        let notes = (0..count).map(note).collect();
        store
            .insert_notes(user_id, notes, NoteSource::Batch)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_defaults_disable_collection() {
        let (service, _, user_id) = setup().await;

        let settings = service.settings(&user_id).await.unwrap();
        assert!(!settings.persisted);

        let err = service.check(&user_id, 1).await.unwrap_err();
        assert!(matches!(err, AccessError::CollectionDisabled));
    }

    #[tokio::test]
    async fn test_quota_gate_against_stored_notes() {
        let (service, store, user_id) = setup().await;
        let enabled = service.set_enabled(&user_id, true).await.unwrap();
        assert!(enabled.persisted);
        assert_eq!(enabled.collection_daily_limit, 500);

        let err = service.check(&user_id, 51).await.unwrap_err();
        assert!(matches!(err, AccessError::BatchLimitExceeded { .. }));

        seed(&store, &user_id, 449).await;
        service.check(&user_id, 50).await.unwrap();

        seed(&store, &user_id, 21).await;
        let err = service.check(&user_id, 50).await.unwrap_err();
        assert!(matches!(err, AccessError::DailyLimitExceeded { used: 470, .. }));
    }

    #[tokio::test]
    async fn test_yesterday_does_not_count() {
        let (service, store, user_id) = setup().await;
        service.set_enabled(&user_id, true).await.unwrap();
        seed(&store, &user_id, 480).await;

        let tomorrow = Utc::now() + chrono::Duration::days(1);
        service.check_at(&user_id, 50, tomorrow).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_settings_requires_a_field() {
        let (service, _, user_id) = setup().await;

        let err = service
            .update_settings(&user_id, &SettingsPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));

        let patch = SettingsPatch {
            daily_limit: Some(10),
            batch_limit: Some(-5),
            collection_enabled: Some(true),
        };
        let settings = service.update_settings(&user_id, &patch).await.unwrap();
        assert_eq!(settings.collection_daily_limit, 10);
        assert_eq!(settings.collection_batch_limit, 50);
        assert!(settings.collection_enabled);

        let usage = service.settings_with_usage(&user_id).await.unwrap();
        assert_eq!(usage.today_count, 0);
        assert_eq!(usage.remaining_today, 10);
    }
}
