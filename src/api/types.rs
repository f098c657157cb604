use serde::{Deserialize, Serialize};

use crate::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE};
use crate::db::Note;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable machine-readable error kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl PageQuery {
    /// 1-based page and page size, both clamped.
    #[must_use]
    pub fn resolve(self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, size)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
    pub id: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub tags: Vec<String>,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
    pub note_type: String,
    pub cover_image_url: String,
    pub likes: i32,
    pub collects: i32,
    pub comments: i32,
    pub publish_date: i64,
    pub source: String,
    pub capture_timestamp: i64,
    pub created_at: String,
}

impl From<Note> for NoteDto {
    fn from(note: Note) -> Self {
        Self {
            tags: serde_json::from_str(&note.tags).unwrap_or_default(),
            image_urls: serde_json::from_str(&note.image_urls).unwrap_or_default(),
            id: note.id,
            url: note.url,
            title: note.title,
            author: note.author,
            content: note.content,
            video_url: note.video_url,
            note_type: note.note_type,
            cover_image_url: note.cover_image_url,
            likes: note.likes,
            collects: note.collects,
            comments: note.comments,
            publish_date: note.publish_date,
            source: note.source,
            capture_timestamp: note.capture_timestamp,
            created_at: note.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery {
            page: Some(0),
            page_size: Some(10_000),
        };
        assert_eq!(q.resolve(), (1, MAX_PAGE_SIZE));

        let q = PageQuery {
            page: None,
            page_size: None,
        };
        assert_eq!(q.resolve(), (1, DEFAULT_PAGE_SIZE));

        let q = PageQuery {
            page: Some(u64::MAX),
            page_size: Some(100),
        };
        assert_eq!(q.resolve(), (MAX_PAGE, 100));
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::error("nope", "forbidden")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "error": "nope", "code": "forbidden" })
        );
    }
}
