use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, sea_query::Expr,
};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::{parse_timestamp, timestamp};
use crate::entities::{api_keys, prelude::*};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyStats {
    pub total_count: u64,
    pub active_count: u64,
    pub last_used: Option<String>,
}

pub struct ApiKeyRepository {
    conn: DatabaseConnection,
}

impl ApiKeyRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `None` when the insert hits a uniqueness constraint, which in
    /// practice means the user already holds a live active key.
    pub async fn insert(
        &self,
        user_id: &str,
        name: &str,
        key: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<api_keys::Model>> {
        let active_model = api_keys::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            name: Set(name.to_string()),
            key: Set(key.to_string()),
            is_active: Set(true),
            last_used: Set(None),
            expires_at: Set(expires_at.map(timestamp)),
            created_at: Set(timestamp(Utc::now())),
            deleted_at: Set(None),
        };

        match active_model.insert(&self.conn).await {
            Ok(model) => Ok(Some(model)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(None),
            Err(e) => Err(e).context("Failed to insert API key"),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<api_keys::Model>> {
        ApiKeys::find_by_id(id.to_string())
            .filter(api_keys::Column::DeletedAt.is_null())
            .one(&self.conn)
            .await
            .context("Failed to query API key by ID")
    }

    pub async fn get_active_by_key(&self, key: &str) -> Result<Option<api_keys::Model>> {
        ApiKeys::find()
            .filter(api_keys::Column::Key.eq(key))
            .filter(api_keys::Column::IsActive.eq(true))
            .filter(api_keys::Column::DeletedAt.is_null())
            .one(&self.conn)
            .await
            .context("Failed to query API key by secret")
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<api_keys::Model>> {
        ApiKeys::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::DeletedAt.is_null())
            .order_by_desc(api_keys::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list API keys")
    }

    pub async fn count_active_for_user(&self, user_id: &str) -> Result<u64> {
        ApiKeys::find()
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .filter(api_keys::Column::DeletedAt.is_null())
            .count(&self.conn)
            .await
            .context("Failed to count active API keys")
    }

    /// Users among `user_ids` holding an active key that has not expired at
    /// `now`, in one query.
    pub async fn users_with_live_key(
        &self,
        user_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<String> = ApiKeys::find()
            .select_only()
            .column(api_keys::Column::UserId)
            .distinct()
            .filter(api_keys::Column::UserId.is_in(user_ids.iter().cloned()))
            .filter(api_keys::Column::IsActive.eq(true))
            .filter(api_keys::Column::DeletedAt.is_null())
            .filter(
                Condition::any()
                    .add(api_keys::Column::ExpiresAt.is_null())
                    .add(api_keys::Column::ExpiresAt.gte(timestamp(now))),
            )
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to look up users with live API keys")?;

        Ok(rows.into_iter().collect())
    }

    pub async fn touch_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        ApiKeys::update_many()
            .col_expr(api_keys::Column::LastUsed, Expr::value(timestamp(at)))
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record API key usage")?;
        Ok(())
    }

    pub async fn deactivate(&self, id: &str) -> Result<()> {
        ApiKeys::update_many()
            .col_expr(api_keys::Column::IsActive, Expr::value(false))
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate API key")?;
        Ok(())
    }

    pub async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        ApiKeys::update_many()
            .col_expr(api_keys::Column::DeletedAt, Expr::value(timestamp(at)))
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to delete API key")?;
        Ok(())
    }

    pub async fn deactivate_expired_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = ApiKeys::update_many()
            .col_expr(api_keys::Column::IsActive, Expr::value(false))
            .filter(api_keys::Column::UserId.eq(user_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .filter(api_keys::Column::DeletedAt.is_null())
            .filter(api_keys::Column::ExpiresAt.is_not_null())
            .filter(api_keys::Column::ExpiresAt.lt(timestamp(now)))
            .exec(&self.conn)
            .await
            .context("Failed to deactivate expired API keys")?;

        Ok(result.rows_affected)
    }

    pub async fn update_expires_at(&self, id: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        ApiKeys::update_many()
            .col_expr(
                api_keys::Column::ExpiresAt,
                Expr::value(expires_at.map(timestamp)),
            )
            .filter(api_keys::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update API key expiry")?;
        Ok(())
    }

    pub async fn stats(&self, user_id: &str) -> Result<ApiKeyStats> {
        let keys = self.list_for_user(user_id).await?;

        let active_count = keys.iter().filter(|k| k.is_active).count() as u64;
        let last_used = keys
            .iter()
            .filter_map(|k| k.last_used.as_deref().and_then(parse_timestamp))
            .max()
            .map(timestamp);

        Ok(ApiKeyStats {
            total_count: keys.len() as u64,
            active_count,
            last_used,
        })
    }
}
