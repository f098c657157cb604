use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Local identifier (UUID v4), assigned at creation.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Stable identifier issued by the auth center. One row per value.
    #[sea_orm(unique)]
    pub auth_center_user_id: String,

    pub union_id: Option<String>,

    pub nickname: Option<String>,

    pub avatar_url: Option<String>,

    /// Informational only; admin authority comes from the configured allow-list.
    pub role: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
