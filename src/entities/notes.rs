use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    pub url: String,

    pub title: String,

    pub author: String,

    pub content: String,

    /// JSON array of strings
    pub tags: String,

    /// JSON array of strings
    pub image_urls: String,

    pub video_url: Option<String>,

    pub note_type: String,

    pub cover_image_url: String,

    pub likes: i32,

    pub collects: i32,

    pub comments: i32,

    pub publish_date: i64,

    /// "single" or "batch"
    pub source: String,

    pub capture_timestamp: i64,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
