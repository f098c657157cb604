use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    Single,
    Batch,
}

impl NoteSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batch => "batch",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub note_type: String,
    #[serde(default)]
    pub cover_image_url: String,
    #[serde(default)]
    pub likes: i32,
    #[serde(default)]
    pub collects: i32,
    #[serde(default)]
    pub comments: i32,
    #[serde(default)]
    pub publish_date: i64,
    pub capture_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlogger {
    pub xhs_id: String,
    #[serde(default)]
    pub blogger_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub followers_count: i32,
    #[serde(default)]
    pub blogger_url: String,
    pub capture_timestamp: i64,
}

/// Partial edit of a stored note; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_urls: Option<Vec<String>>,
    pub video_url: Option<String>,
    pub note_type: Option<String>,
    pub cover_image_url: Option<String>,
    pub likes: Option<i32>,
    pub collects: Option<i32>,
    pub comments: Option<i32>,
}

impl NoteUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.image_urls.is_none()
            && self.video_url.is_none()
            && self.note_type.is_none()
            && self.cover_image_url.is_none()
            && self.likes.is_none()
            && self.collects.is_none()
            && self.comments.is_none()
    }
}
