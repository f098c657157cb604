//! Domain service for collection quotas.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use serde::Serialize;

use crate::db::{Settings, SettingsPatch};
use crate::services::error::AccessError;

/// The calendar day containing `now` in `offset`, as a half-open UTC range.
#[must_use]
pub fn day_window(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = now.with_timezone(&offset).date_naive();
    let midnight = local_date.and_time(chrono::NaiveTime::MIN);
    let start = offset
        .from_local_datetime(&midnight)
        .single()
        .map_or(now, |t| t.with_timezone(&Utc));
    (start, start + Duration::days(1))
}

/// Pure decision over already-loaded state. First failing rule wins.
pub fn decide(settings: &Settings, used_today: u64, requested: usize) -> Result<(), AccessError> {
    if !settings.collection_enabled {
        return Err(AccessError::CollectionDisabled);
    }

    if requested as u64 > u64::try_from(settings.collection_batch_limit).unwrap_or(0) {
        return Err(AccessError::BatchLimitExceeded {
            requested,
            limit: settings.collection_batch_limit,
        });
    }

    let daily_limit = u64::try_from(settings.collection_daily_limit).unwrap_or(0);
    if used_today + requested as u64 > daily_limit {
        return Err(AccessError::DailyLimitExceeded {
            used: used_today,
            requested,
            limit: settings.collection_daily_limit,
        });
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsWithUsage {
    #[serde(flatten)]
    pub settings: Settings,
    pub today_count: u64,
    pub remaining_today: u64,
}

#[async_trait::async_trait]
pub trait QuotaService: Send + Sync {
    /// Approves or rejects a pending write of `requested` items.
    ///
    /// # Errors
    ///
    /// [`AccessError::CollectionDisabled`], [`AccessError::BatchLimitExceeded`]
    /// or [`AccessError::DailyLimitExceeded`], in that order of precedence.
    async fn check(&self, user_id: &str, requested: usize) -> Result<(), AccessError> {
        self.check_at(user_id, requested, Utc::now()).await
    }

    async fn check_at(
        &self,
        user_id: &str,
        requested: usize,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError>;

    /// Only the enabled flag, for writes that are not counted.
    async fn ensure_enabled(&self, user_id: &str) -> Result<(), AccessError>;

    /// Stored settings, or the configured defaults when none are stored.
    async fn settings(&self, user_id: &str) -> Result<Settings, AccessError>;

    async fn settings_with_usage(&self, user_id: &str) -> Result<SettingsWithUsage, AccessError>;

    async fn used_today(&self, user_id: &str, now: DateTime<Utc>) -> Result<u64, AccessError>;

    async fn set_enabled(&self, user_id: &str, enabled: bool) -> Result<Settings, AccessError>;

    async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Settings, AccessError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaConfig;

    fn enabled() -> Settings {
        let mut settings = Settings::defaults("u1", &QuotaConfig::default());
        settings.collection_enabled = true;
        settings
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        let settings = Settings::defaults("u1", &QuotaConfig::default());
        assert!(matches!(
            decide(&settings, 10_000, 10_000),
            Err(AccessError::CollectionDisabled)
        ));
    }

    #[test]
    fn test_batch_limit() {
        assert!(decide(&enabled(), 0, 50).is_ok());
        assert!(matches!(
            decide(&enabled(), 0, 51),
            Err(AccessError::BatchLimitExceeded { requested: 51, limit: 50 })
        ));
    }

    #[test]
    fn test_batch_checked_before_daily() {
        assert!(matches!(
            decide(&enabled(), 500, 51),
            Err(AccessError::BatchLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_daily_limit() {
        assert!(matches!(
            decide(&enabled(), 470, 50),
            Err(AccessError::DailyLimitExceeded { used: 470, .. })
        ));
        assert!(decide(&enabled(), 449, 50).is_ok());
        assert!(decide(&enabled(), 450, 50).is_ok());
        assert!(decide(&enabled(), 500, 0).is_ok());
    }

    #[test]
    fn test_day_window_uses_offset() {
        let offset: FixedOffset = "+08:00".parse().unwrap();
        // 2026-03-01 17:30 UTC is 2026-03-02 01:30 at +08:00.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 17, 30, 0).unwrap();
        let (start, end) = day_window(now, offset);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 1, 16, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap());
        assert!(start <= now && now < end);
    }

    #[test]
    fn test_day_window_utc() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let (start, end) = day_window(now, offset);
        assert_eq!(start, now);
        assert_eq!(end - start, Duration::days(1));
    }
}
