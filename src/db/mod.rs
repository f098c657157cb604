use crate::clients::auth_center::ExternalProfile;
use crate::config::QuotaConfig;
use crate::models::content::{NewBlogger, NewNote, NoteSource, NoteUpdate};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::api_keys::Model as ApiKeyRecord;
pub use crate::entities::bloggers::Model as Blogger;
pub use crate::entities::notes::Model as Note;
pub use crate::entities::users::Model as User;
pub use repositories::api_key::ApiKeyStats;
pub use repositories::user_settings::{Settings, SettingsPatch};

/// Formats a timestamp for storage.
///
/// Fixed width (microseconds, `Z` suffix) so that string comparison in SQL
/// matches chronological order.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn api_key_repo(&self) -> repositories::api_key::ApiKeyRepository {
        repositories::api_key::ApiKeyRepository::new(self.conn.clone())
    }

    fn settings_repo(&self) -> repositories::user_settings::UserSettingsRepository {
        repositories::user_settings::UserSettingsRepository::new(self.conn.clone())
    }

    fn note_repo(&self) -> repositories::note::NoteRepository {
        repositories::note::NoteRepository::new(self.conn.clone())
    }

    fn blogger_repo(&self) -> repositories::blogger::BloggerRepository {
        repositories::blogger::BloggerRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_auth_center_id(&self, auth_center_user_id: &str) -> Result<Option<User>> {
        self.user_repo()
            .get_by_auth_center_id(auth_center_user_id)
            .await
    }

    /// Inserts the user unless one already exists for the auth-center id, then
    /// returns the stored row. The flag is true when this call created it.
    pub async fn insert_user_if_absent(
        &self,
        auth_center_user_id: &str,
        profile: &ExternalProfile,
    ) -> Result<(User, bool)> {
        self.user_repo()
            .insert_if_absent(auth_center_user_id, profile)
            .await
    }

    pub async fn list_users(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64)> {
        self.user_repo().list(page, page_size).await
    }

    pub async fn user_count(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    // API keys

    pub async fn insert_api_key(
        &self,
        user_id: &str,
        name: &str,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<ApiKeyRecord>> {
        self.api_key_repo()
            .insert(user_id, name, key, expires_at)
            .await
    }

    pub async fn get_api_key(&self, id: &str) -> Result<Option<ApiKeyRecord>> {
        self.api_key_repo().get_by_id(id).await
    }

    pub async fn get_active_api_key_by_secret(&self, key: &str) -> Result<Option<ApiKeyRecord>> {
        self.api_key_repo().get_active_by_key(key).await
    }

    pub async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRecord>> {
        self.api_key_repo().list_for_user(user_id).await
    }

    pub async fn count_active_api_keys(&self, user_id: &str) -> Result<u64> {
        self.api_key_repo().count_active_for_user(user_id).await
    }

    pub async fn users_with_live_api_key(
        &self,
        user_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        self.api_key_repo().users_with_live_key(user_ids, now).await
    }

    pub async fn touch_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.api_key_repo().touch_last_used(id, at).await
    }

    pub async fn deactivate_api_key(&self, id: &str) -> Result<()> {
        self.api_key_repo().deactivate(id).await
    }

    pub async fn soft_delete_api_key(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.api_key_repo().soft_delete(id, at).await
    }

    pub async fn deactivate_expired_api_keys(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        self.api_key_repo()
            .deactivate_expired_for_user(user_id, now)
            .await
    }

    pub async fn set_api_key_expiry(
        &self,
        id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.api_key_repo().update_expires_at(id, expires_at).await
    }

    pub async fn api_key_stats(&self, user_id: &str) -> Result<ApiKeyStats> {
        self.api_key_repo().stats(user_id).await
    }

    // Settings

    pub async fn get_settings(&self, user_id: &str) -> Result<Option<Settings>> {
        self.settings_repo().get(user_id).await
    }

    pub async fn set_collection_enabled(
        &self,
        user_id: &str,
        enabled: bool,
        defaults: &QuotaConfig,
    ) -> Result<Settings> {
        self.settings_repo()
            .set_enabled(user_id, enabled, defaults)
            .await
    }

    pub async fn apply_settings_patch(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
        defaults: &QuotaConfig,
    ) -> Result<Settings> {
        self.settings_repo()
            .apply_patch(user_id, patch, defaults)
            .await
    }

    // Notes

    pub async fn insert_notes(
        &self,
        user_id: &str,
        notes: Vec<NewNote>,
        source: NoteSource,
    ) -> Result<Vec<Note>> {
        self.note_repo().insert_many(user_id, notes, source).await
    }

    pub async fn count_notes_created_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        self.note_repo()
            .count_created_between(user_id, start, end)
            .await
    }

    pub async fn list_notes(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Note>, u64)> {
        self.note_repo()
            .list_for_user(user_id, page, page_size)
            .await
    }

    pub async fn get_note(&self, user_id: &str, id: &str) -> Result<Option<Note>> {
        self.note_repo().get_owned(user_id, id).await
    }

    pub async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        update: NoteUpdate,
    ) -> Result<Option<Note>> {
        self.note_repo().update_owned(user_id, id, update).await
    }

    pub async fn delete_note(&self, user_id: &str, id: &str) -> Result<bool> {
        self.note_repo().delete_owned(user_id, id).await
    }

    pub async fn note_count(&self, user_id: &str) -> Result<u64> {
        self.note_repo().count_for_user(user_id).await
    }

    // Bloggers

    pub async fn upsert_blogger(&self, user_id: &str, blogger: NewBlogger) -> Result<Blogger> {
        self.blogger_repo().upsert(user_id, blogger).await
    }

    pub async fn upsert_bloggers(
        &self,
        user_id: &str,
        bloggers: Vec<NewBlogger>,
    ) -> Result<Vec<Blogger>> {
        self.blogger_repo().upsert_many(user_id, bloggers).await
    }

    pub async fn get_blogger(&self, user_id: &str, id: &str) -> Result<Option<Blogger>> {
        self.blogger_repo().get_owned(user_id, id).await
    }

    pub async fn get_blogger_by_xhs_id(
        &self,
        user_id: &str,
        xhs_id: &str,
    ) -> Result<Option<Blogger>> {
        self.blogger_repo()
            .get_owned_by_xhs_id(user_id, xhs_id)
            .await
    }

    pub async fn delete_blogger(&self, user_id: &str, id: &str) -> Result<bool> {
        self.blogger_repo().delete_owned(user_id, id).await
    }

    pub async fn list_bloggers(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Blogger>, u64)> {
        self.blogger_repo()
            .list_for_user(user_id, page, page_size)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(timestamp(a), "2026-01-02T03:04:05.000000Z");
        assert_eq!(timestamp(a).len(), timestamp(b).len());
        assert!(timestamp(a) < timestamp(b));
    }

    #[test]
    fn test_parse_timestamp_roundtrip() {
        let a = Utc.with_ymd_and_hms(2026, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(parse_timestamp(&timestamp(a)), Some(a));
        assert_eq!(parse_timestamp("not a time"), None);
    }
}
