use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use serde::Serialize;

use crate::config::QuotaConfig;
use crate::db::timestamp;
use crate::entities::{prelude::*, user_settings};

/// Per-user collection quota settings.
///
/// When no row exists a virtual record is synthesized from the configured
/// defaults; `persisted` tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub user_id: String,
    pub collection_enabled: bool,
    pub collection_daily_limit: i32,
    pub collection_batch_limit: i32,
    pub persisted: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Settings {
    #[must_use]
    pub fn defaults(user_id: &str, defaults: &QuotaConfig) -> Self {
        Self {
            user_id: user_id.to_string(),
            collection_enabled: defaults.collection_enabled,
            collection_daily_limit: defaults.daily_limit,
            collection_batch_limit: defaults.batch_limit,
            persisted: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<user_settings::Model> for Settings {
    fn from(model: user_settings::Model) -> Self {
        Self {
            user_id: model.user_id,
            collection_enabled: model.collection_enabled,
            collection_daily_limit: model.collection_daily_limit,
            collection_batch_limit: model.collection_batch_limit,
            persisted: true,
            created_at: Some(model.created_at),
            updated_at: Some(model.updated_at),
        }
    }
}

/// Partial update. Negative limits are ignored.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub daily_limit: Option<i32>,
    pub batch_limit: Option<i32>,
    pub collection_enabled: Option<bool>,
}

impl SettingsPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.daily_limit.is_none() && self.batch_limit.is_none() && self.collection_enabled.is_none()
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(limit) = self.daily_limit.filter(|l| *l >= 0) {
            settings.collection_daily_limit = limit;
        }
        if let Some(limit) = self.batch_limit.filter(|l| *l >= 0) {
            settings.collection_batch_limit = limit;
        }
        if let Some(enabled) = self.collection_enabled {
            settings.collection_enabled = enabled;
        }
    }
}

pub struct UserSettingsRepository {
    conn: DatabaseConnection,
}

impl UserSettingsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Settings>> {
        let model = UserSettings::find_by_id(user_id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user settings")?;

        Ok(model.map(Settings::from))
    }

    /// Flips the enabled flag, materializing the row with defaults if needed.
    pub async fn set_enabled(
        &self,
        user_id: &str,
        enabled: bool,
        defaults: &QuotaConfig,
    ) -> Result<Settings> {
        let now = timestamp(chrono::Utc::now());

        let active_model = user_settings::ActiveModel {
            user_id: Set(user_id.to_string()),
            collection_enabled: Set(enabled),
            collection_daily_limit: Set(defaults.daily_limit),
            collection_batch_limit: Set(defaults.batch_limit),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        UserSettings::insert(active_model)
            .on_conflict(
                OnConflict::column(user_settings::Column::UserId)
                    .update_columns([
                        user_settings::Column::CollectionEnabled,
                        user_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert collection flag")?;

        self.get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Settings for {user_id} missing after upsert"))
    }

    pub async fn apply_patch(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
        defaults: &QuotaConfig,
    ) -> Result<Settings> {
        let mut settings = self
            .get(user_id)
            .await?
            .unwrap_or_else(|| Settings::defaults(user_id, defaults));
        patch.apply(&mut settings);

        let now = timestamp(chrono::Utc::now());

        let active_model = user_settings::ActiveModel {
            user_id: Set(user_id.to_string()),
            collection_enabled: Set(settings.collection_enabled),
            collection_daily_limit: Set(settings.collection_daily_limit),
            collection_batch_limit: Set(settings.collection_batch_limit),
            created_at: Set(settings.created_at.clone().unwrap_or_else(|| now.clone())),
            updated_at: Set(now),
        };

        UserSettings::insert(active_model)
            .on_conflict(
                OnConflict::column(user_settings::Column::UserId)
                    .update_columns([
                        user_settings::Column::CollectionEnabled,
                        user_settings::Column::CollectionDailyLimit,
                        user_settings::Column::CollectionBatchLimit,
                        user_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to upsert user settings")?;

        self.get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Settings for {user_id} missing after upsert"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_ignores_negative_limits() {
        let mut settings = Settings::defaults("u1", &QuotaConfig::default());
        let patch = SettingsPatch {
            daily_limit: Some(-1),
            batch_limit: Some(20),
            collection_enabled: None,
        };
        patch.apply(&mut settings);

        assert_eq!(settings.collection_daily_limit, 500);
        assert_eq!(settings.collection_batch_limit, 20);
        assert!(!settings.collection_enabled);
    }

    #[test]
    fn test_default_settings_are_virtual() {
        let settings = Settings::defaults("u1", &QuotaConfig::default());
        assert!(!settings.persisted);
        assert!(!settings.collection_enabled);
        assert_eq!(settings.collection_daily_limit, 500);
        assert_eq!(settings.collection_batch_limit, 50);
    }
}
