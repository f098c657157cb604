use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::clients::auth_center::ExternalProfile;
use crate::entities::{prelude::*, users};
use crate::constants::users::DEFAULT_ROLE;

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<users::Model>> {
        Users::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    pub async fn get_by_auth_center_id(
        &self,
        auth_center_user_id: &str,
    ) -> Result<Option<users::Model>> {
        Users::find()
            .filter(users::Column::AuthCenterUserId.eq(auth_center_user_id))
            .one(&self.conn)
            .await
            .context("Failed to query user by auth center ID")
    }

    /// Single conditional write keyed on the auth-center id: the insert is a
    /// no-op when a concurrent request got there first, and the surviving row
    /// is read back either way.
    pub async fn insert_if_absent(
        &self,
        auth_center_user_id: &str,
        profile: &ExternalProfile,
    ) -> Result<(users::Model, bool)> {
        let now = crate::db::timestamp(chrono::Utc::now());

        let active_model = users::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            auth_center_user_id: Set(auth_center_user_id.to_string()),
            union_id: Set(profile.union_id.clone()),
            nickname: Set(profile.nickname.clone()),
            avatar_url: Set(profile.avatar_url.clone()),
            role: Set(DEFAULT_ROLE.to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = match Users::insert(active_model)
            .on_conflict(
                OnConflict::column(users::Column::AuthCenterUserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
        {
            Ok(rows) => rows > 0,
            Err(DbErr::RecordNotInserted) => false,
            Err(e) => return Err(e).context("Failed to insert user"),
        };

        let user = self
            .get_by_auth_center_id(auth_center_user_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("User {auth_center_user_id} missing after conditional insert")
            })?;

        Ok((user, inserted))
    }

    /// Newest users first. `page` is 1-based.
    pub async fn list(&self, page: u64, page_size: u64) -> Result<(Vec<users::Model>, u64)> {
        let paginator = Users::find()
            .order_by_desc(users::Column::CreatedAt)
            .paginate(&self.conn, page_size.max(1));

        let total = paginator
            .num_items()
            .await
            .context("Failed to count users")?;
        let Some(index) = super::page_index(page, page_size) else {
            return Ok((Vec::new(), total));
        };
        let items = paginator
            .fetch_page(index)
            .await
            .context("Failed to list users")?;

        Ok((items, total))
    }

    pub async fn count(&self) -> Result<u64> {
        Users::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }
}
