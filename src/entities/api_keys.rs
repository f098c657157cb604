use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    pub name: String,

    /// Secret value, stored as issued so validation is an exact-match lookup.
    #[sea_orm(unique)]
    pub key: String,

    pub is_active: bool,

    pub last_used: Option<String>,

    /// `None` means the key never expires.
    pub expires_at: Option<String>,

    pub created_at: String,

    /// Soft-deletion marker.
    pub deleted_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
