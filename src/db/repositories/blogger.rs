use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::db::timestamp;
use crate::entities::{bloggers, prelude::*};
use crate::models::content::NewBlogger;

pub struct BloggerRepository {
    conn: DatabaseConnection,
}

impl BloggerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert or refresh by platform id. Ownership stays with the first
    /// collector.
    pub async fn upsert(&self, user_id: &str, blogger: NewBlogger) -> Result<bloggers::Model> {
        upsert_on(&self.conn, user_id, blogger).await
    }

    /// Upserts the whole batch in one transaction; nothing is kept if any row
    /// fails.
    pub async fn upsert_many(
        &self,
        user_id: &str,
        bloggers: Vec<NewBlogger>,
    ) -> Result<Vec<bloggers::Model>> {
        let txn = self.conn.begin().await?;

        let mut stored = Vec::with_capacity(bloggers.len());
        for blogger in bloggers {
            stored.push(upsert_on(&txn, user_id, blogger).await?);
        }

        txn.commit().await.context("Failed to commit blogger batch")?;
        Ok(stored)
    }

    pub async fn get_owned(&self, user_id: &str, id: &str) -> Result<Option<bloggers::Model>> {
        Bloggers::find_by_id(id)
            .filter(bloggers::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to load blogger")
    }

    pub async fn get_owned_by_xhs_id(
        &self,
        user_id: &str,
        xhs_id: &str,
    ) -> Result<Option<bloggers::Model>> {
        Bloggers::find()
            .filter(bloggers::Column::XhsId.eq(xhs_id))
            .filter(bloggers::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to load blogger")
    }

    /// Deletes the blogger only if it belongs to `user_id`.
    pub async fn delete_owned(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = Bloggers::delete_many()
            .filter(bloggers::Column::Id.eq(id))
            .filter(bloggers::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete blogger")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<bloggers::Model>, u64)> {
        let paginator = Bloggers::find()
            .filter(bloggers::Column::UserId.eq(user_id))
            .order_by_desc(bloggers::Column::FollowersCount)
            .paginate(&self.conn, page_size.max(1));

        let total = paginator.num_items().await?;
        let Some(index) = super::page_index(page, page_size) else {
            return Ok((Vec::new(), total));
        };
        let items = paginator.fetch_page(index).await?;

        Ok((items, total))
    }
}

async fn upsert_on<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    blogger: NewBlogger,
) -> Result<bloggers::Model> {
    let now = timestamp(chrono::Utc::now());
    let xhs_id = blogger.xhs_id.clone();

    let active_model = bloggers::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        xhs_id: Set(blogger.xhs_id),
        blogger_name: Set(blogger.blogger_name),
        avatar_url: Set(blogger.avatar_url),
        description: Set(blogger.description),
        followers_count: Set(blogger.followers_count),
        blogger_url: Set(blogger.blogger_url),
        capture_timestamp: Set(blogger.capture_timestamp),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    };

    Bloggers::insert(active_model)
        .on_conflict(
            OnConflict::column(bloggers::Column::XhsId)
                .update_columns([
                    bloggers::Column::BloggerName,
                    bloggers::Column::AvatarUrl,
                    bloggers::Column::Description,
                    bloggers::Column::FollowersCount,
                    bloggers::Column::BloggerUrl,
                    bloggers::Column::CaptureTimestamp,
                    bloggers::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .context("Failed to upsert blogger")?;

    Bloggers::find()
        .filter(bloggers::Column::XhsId.eq(xhs_id.as_str()))
        .one(conn)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Blogger {xhs_id} missing after upsert"))
}
