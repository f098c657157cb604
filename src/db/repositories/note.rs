use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::db::timestamp;
use crate::entities::{notes, prelude::*};
use crate::models::content::{NewNote, NoteSource, NoteUpdate};

pub struct NoteRepository {
    conn: DatabaseConnection,
}

impl NoteRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert_many(
        &self,
        user_id: &str,
        notes: Vec<NewNote>,
        source: NoteSource,
    ) -> Result<Vec<notes::Model>> {
        if notes.is_empty() {
            return Ok(vec![]);
        }

        let now = timestamp(Utc::now());
        let mut ids = Vec::with_capacity(notes.len());

        let models = notes
            .into_iter()
            .map(|note| {
                let id = Uuid::new_v4().to_string();
                ids.push(id.clone());
                notes::ActiveModel {
                    id: Set(id),
                    user_id: Set(user_id.to_string()),
                    url: Set(note.url),
                    title: Set(note.title),
                    author: Set(note.author),
                    content: Set(note.content),
                    tags: Set(serde_json::to_string(&note.tags).unwrap_or_else(|_| "[]".into())),
                    image_urls: Set(
                        serde_json::to_string(&note.image_urls).unwrap_or_else(|_| "[]".into())
                    ),
                    video_url: Set(note.video_url),
                    note_type: Set(note.note_type),
                    cover_image_url: Set(note.cover_image_url),
                    likes: Set(note.likes),
                    collects: Set(note.collects),
                    comments: Set(note.comments),
                    publish_date: Set(note.publish_date),
                    source: Set(source.as_str().to_string()),
                    capture_timestamp: Set(note.capture_timestamp),
                    created_at: Set(now.clone()),
                    updated_at: Set(now.clone()),
                }
            })
            .collect::<Vec<_>>();

        Notes::insert_many(models)
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert notes")?;

        Notes::find()
            .filter(notes::Column::Id.is_in(ids))
            .order_by_asc(notes::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to read back inserted notes")
    }

    /// Counts notes created in `[start, end)`.
    pub async fn count_created_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        Notes::find()
            .filter(notes::Column::UserId.eq(user_id))
            .filter(notes::Column::CreatedAt.gte(timestamp(start)))
            .filter(notes::Column::CreatedAt.lt(timestamp(end)))
            .count(&self.conn)
            .await
            .context("Failed to count notes in window")
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<notes::Model>, u64)> {
        let paginator = Notes::find()
            .filter(notes::Column::UserId.eq(user_id))
            .order_by_desc(notes::Column::CreatedAt)
            .paginate(&self.conn, page_size.max(1));

        let total = paginator.num_items().await?;
        let Some(index) = super::page_index(page, page_size) else {
            return Ok((Vec::new(), total));
        };
        let items = paginator.fetch_page(index).await?;

        Ok((items, total))
    }

    pub async fn get_owned(&self, user_id: &str, id: &str) -> Result<Option<notes::Model>> {
        Notes::find_by_id(id)
            .filter(notes::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to load note")
    }

    /// Applies `update` to the note if it belongs to `user_id`.
    pub async fn update_owned(
        &self,
        user_id: &str,
        id: &str,
        update: NoteUpdate,
    ) -> Result<Option<notes::Model>> {
        let Some(existing) = self.get_owned(user_id, id).await? else {
            return Ok(None);
        };

        let mut active: notes::ActiveModel = existing.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(author) = update.author {
            active.author = Set(author);
        }
        if let Some(content) = update.content {
            active.content = Set(content);
        }
        if let Some(tags) = update.tags {
            active.tags = Set(serde_json::to_string(&tags)?);
        }
        if let Some(image_urls) = update.image_urls {
            active.image_urls = Set(serde_json::to_string(&image_urls)?);
        }
        if let Some(video_url) = update.video_url {
            active.video_url = Set(Some(video_url).filter(|u| !u.is_empty()));
        }
        if let Some(note_type) = update.note_type {
            active.note_type = Set(note_type);
        }
        if let Some(cover_image_url) = update.cover_image_url {
            active.cover_image_url = Set(cover_image_url);
        }
        if let Some(likes) = update.likes {
            active.likes = Set(likes);
        }
        if let Some(collects) = update.collects {
            active.collects = Set(collects);
        }
        if let Some(comments) = update.comments {
            active.comments = Set(comments);
        }
        active.updated_at = Set(timestamp(Utc::now()));

        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to update note")?;
        Ok(Some(updated))
    }

    /// Deletes the note only if it belongs to `user_id`.
    pub async fn delete_owned(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = Notes::delete_many()
            .filter(notes::Column::Id.eq(id))
            .filter(notes::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete note")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        Notes::find()
            .filter(notes::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count notes")
    }
}
