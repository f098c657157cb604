//! Collected notes and bloggers, behind the quota gate.

use std::sync::Arc;

use tracing::info;

use crate::db::{Blogger, Note, Store};
use crate::models::content::{NewBlogger, NewNote, NoteSource, NoteUpdate};
use crate::services::error::AccessError;
use crate::services::quota_service::QuotaService;

pub struct ContentService {
    store: Store,
    quota: Arc<dyn QuotaService>,
}

impl ContentService {
    #[must_use]
    pub fn new(store: Store, quota: Arc<dyn QuotaService>) -> Self {
        Self { store, quota }
    }

    fn validate_notes(notes: &[NewNote]) -> Result<(), AccessError> {
        if notes.iter().any(|n| n.url.trim().is_empty()) {
            return Err(AccessError::Validation("Note url is required".to_string()));
        }
        Ok(())
    }

    pub async fn create_note(&self, user_id: &str, note: NewNote) -> Result<Note, AccessError> {
        Self::validate_notes(std::slice::from_ref(&note))?;
        self.quota.check(user_id, 1).await?;

        self.store
            .insert_notes(user_id, vec![note], NoteSource::Single)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::Internal("Inserted note not returned".to_string()))
    }

    /// The whole batch counts against the quota; it is accepted or rejected
    /// as a unit.
    pub async fn create_notes(
        &self,
        user_id: &str,
        notes: Vec<NewNote>,
    ) -> Result<Vec<Note>, AccessError> {
        Self::validate_notes(&notes)?;
        self.quota.check(user_id, notes.len()).await?;

        let inserted = self
            .store
            .insert_notes(user_id, notes, NoteSource::Batch)
            .await?;
        info!(user_id = %user_id, count = inserted.len(), "Stored note batch");
        Ok(inserted)
    }

    pub async fn list_notes(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Note>, u64), AccessError> {
        Ok(self.store.list_notes(user_id, page, page_size).await?)
    }

    /// Notes owned by someone else read as missing.
    pub async fn get_note(&self, user_id: &str, note_id: &str) -> Result<Note, AccessError> {
        self.store
            .get_note(user_id, note_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("Note".to_string()))
    }

    pub async fn update_note(
        &self,
        user_id: &str,
        note_id: &str,
        update: NoteUpdate,
    ) -> Result<Note, AccessError> {
        if update.is_empty() {
            return Err(AccessError::Validation("No fields to update".to_string()));
        }

        self.store
            .update_note(user_id, note_id, update)
            .await?
            .ok_or_else(|| AccessError::NotFound("Note".to_string()))
    }

    pub async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<(), AccessError> {
        if self.store.delete_note(user_id, note_id).await? {
            Ok(())
        } else {
            Err(AccessError::NotFound("Note".to_string()))
        }
    }

    pub async fn upsert_blogger(
        &self,
        user_id: &str,
        blogger: NewBlogger,
    ) -> Result<Blogger, AccessError> {
        if blogger.xhs_id.trim().is_empty() {
            return Err(AccessError::Validation("xhsId is required".to_string()));
        }
        self.quota.ensure_enabled(user_id).await?;

        Ok(self.store.upsert_blogger(user_id, blogger).await?)
    }

    pub async fn upsert_bloggers(
        &self,
        user_id: &str,
        bloggers: Vec<NewBlogger>,
    ) -> Result<Vec<Blogger>, AccessError> {
        if bloggers.iter().any(|b| b.xhs_id.trim().is_empty()) {
            return Err(AccessError::Validation("xhsId is required".to_string()));
        }
        self.quota.ensure_enabled(user_id).await?;

        let stored = self.store.upsert_bloggers(user_id, bloggers).await?;
        info!(user_id = %user_id, count = stored.len(), "Stored blogger batch");
        Ok(stored)
    }

    pub async fn get_blogger(&self, user_id: &str, blogger_id: &str) -> Result<Blogger, AccessError> {
        self.store
            .get_blogger(user_id, blogger_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("Blogger".to_string()))
    }

    pub async fn get_blogger_by_xhs_id(
        &self,
        user_id: &str,
        xhs_id: &str,
    ) -> Result<Blogger, AccessError> {
        self.store
            .get_blogger_by_xhs_id(user_id, xhs_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("Blogger".to_string()))
    }

    pub async fn delete_blogger(&self, user_id: &str, blogger_id: &str) -> Result<(), AccessError> {
        if self.store.delete_blogger(user_id, blogger_id).await? {
            Ok(())
        } else {
            Err(AccessError::NotFound("Blogger".to_string()))
        }
    }

    pub async fn list_bloggers(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Blogger>, u64), AccessError> {
        Ok(self.store.list_bloggers(user_id, page, page_size).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::auth_center::ExternalProfile;
    use crate::config::QuotaConfig;
    use crate::services::quota_service_impl::SeaOrmQuotaService;
    use chrono::FixedOffset;
    use serde_json::json;

    async fn setup() -> (ContentService, Arc<SeaOrmQuotaService>, Store, String) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let (user, _) = store
            .insert_user_if_absent("ext-1", &ExternalProfile::default())
            .await
            .unwrap();
        let quota = Arc::new(SeaOrmQuotaService::new(
            store.clone(),
            QuotaConfig::default(),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let content = ContentService::new(store.clone(), quota.clone());
        (content, quota, store, user.id)
    }

    fn note(url: &str) -> NewNote {
        serde_json::from_value(json!({ "url": url, "captureTimestamp": 1, "tags": ["a"] })).unwrap()
    }

    fn blogger(id: &str, followers: i32) -> NewBlogger {
        serde_json::from_value(json!({
            "xhsId": id,
            "bloggerName": "name",
            "followersCount": followers,
            "captureTimestamp": 1
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_notes_require_enabled_collection() {
        let (content, quota, store, user_id) = setup().await;

        let err = content.create_note(&user_id, note("u1")).await.unwrap_err();
        assert!(matches!(err, AccessError::CollectionDisabled));
        assert_eq!(store.note_count(&user_id).await.unwrap(), 0);

        quota.set_enabled(&user_id, true).await.unwrap();
        let stored = content.create_note(&user_id, note("u1")).await.unwrap();
        assert_eq!(stored.source, "single");
        assert_eq!(stored.tags, r#"["a"]"#);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let (content, quota, store, user_id) = setup().await;
        quota.set_enabled(&user_id, true).await.unwrap();

        let too_many = (0..51).map(|i| note(&format!("u{i}"))).collect();
        let err = content.create_notes(&user_id, too_many).await.unwrap_err();
        assert!(matches!(err, AccessError::BatchLimitExceeded { .. }));
        assert_eq!(store.note_count(&user_id).await.unwrap(), 0);

        let batch = (0..50).map(|i| note(&format!("u{i}"))).collect();
        let stored = content.create_notes(&user_id, batch).await.unwrap();
        assert_eq!(stored.len(), 50);
    }

    #[tokio::test]
    async fn test_delete_only_own_notes() {
        let (content, quota, store, user_id) = setup().await;
        quota.set_enabled(&user_id, true).await.unwrap();
        let stored = content.create_note(&user_id, note("u1")).await.unwrap();

        let err = content.delete_note("someone-else", &stored.id).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        content.delete_note(&user_id, &stored.id).await.unwrap();
        assert_eq!(store.note_count(&user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blogger_upsert_refreshes_existing_row() {
        let (content, quota, _, user_id) = setup().await;

        let err = content
            .upsert_blogger(&user_id, blogger("x1", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::CollectionDisabled));

        quota.set_enabled(&user_id, true).await.unwrap();
        let first = content.upsert_blogger(&user_id, blogger("x1", 10)).await.unwrap();
        let second = content.upsert_blogger(&user_id, blogger("x1", 99)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.followers_count, 99);

        content
            .upsert_bloggers(&user_id, vec![blogger("x2", 5), blogger("x3", 500)])
            .await
            .unwrap();
        let (listed, total) = content.list_bloggers(&user_id, 1, 10).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(listed[0].xhs_id, "x3");
    }

    #[tokio::test]
    async fn test_note_get_and_update_are_owner_scoped() {
        let (content, quota, _, user_id) = setup().await;
        quota.set_enabled(&user_id, true).await.unwrap();
        let stored = content.create_note(&user_id, note("u1")).await.unwrap();

        let err = content.get_note("someone-else", &stored.id).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        let update: NoteUpdate =
            serde_json::from_value(json!({ "title": "edited", "tags": ["b", "c"], "likes": 7 }))
                .unwrap();
        let err = content
            .update_note("someone-else", &stored.id, update.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));

        let err = content
            .update_note(&user_id, &stored.id, NoteUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));

        let updated = content.update_note(&user_id, &stored.id, update).await.unwrap();
        assert_eq!(updated.title, "edited");
        assert_eq!(updated.tags, r#"["b","c"]"#);
        assert_eq!(updated.likes, 7);
        assert_eq!(updated.url, "u1");

        let fetched = content.get_note(&user_id, &stored.id).await.unwrap();
        assert_eq!(fetched.title, "edited");
    }

    #[tokio::test]
    async fn test_blogger_lookup_and_delete_are_owner_scoped() {
        let (content, quota, _, user_id) = setup().await;
        quota.set_enabled(&user_id, true).await.unwrap();
        let stored = content.upsert_blogger(&user_id, blogger("x1", 10)).await.unwrap();

        assert_eq!(content.get_blogger(&user_id, &stored.id).await.unwrap().xhs_id, "x1");
        assert_eq!(
            content.get_blogger_by_xhs_id(&user_id, "x1").await.unwrap().id,
            stored.id
        );

        for err in [
            content.get_blogger("someone-else", &stored.id).await.unwrap_err(),
            content.get_blogger_by_xhs_id("someone-else", "x1").await.unwrap_err(),
            content.delete_blogger("someone-else", &stored.id).await.unwrap_err(),
        ] {
            assert!(matches!(err, AccessError::NotFound(_)));
        }

        content.delete_blogger(&user_id, &stored.id).await.unwrap();
        let err = content.get_blogger(&user_id, &stored.id).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_blogger_batch_rolls_back_on_failure() {
        use sea_orm::ConnectionTrait;

        let (content, quota, store, user_id) = setup().await;
        quota.set_enabled(&user_id, true).await.unwrap();
        store
            .conn
            .execute_unprepared(
                "CREATE TRIGGER reject_bad_blogger BEFORE INSERT ON bloggers \
                 WHEN NEW.xhs_id = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
            )
            .await
            .unwrap();

        let err = content
            .upsert_bloggers(&user_id, vec![blogger("x1", 1), blogger("bad", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Internal(_)));

        let (listed, total) = content.list_bloggers(&user_id, 1, 10).await.unwrap();
        assert_eq!(total, 0);
        assert!(listed.is_empty());
    }
}
