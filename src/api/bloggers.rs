use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse, PageQuery, Paginated};
use crate::db::Blogger;
use crate::models::content::NewBlogger;
use crate::models::identity::Identity;

#[derive(Deserialize)]
pub struct BatchBloggersRequest {
    pub bloggers: Vec<NewBlogger>,
}

/// POST /bloggers
/// Insert or refresh by platform id
pub async fn upsert_blogger(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<NewBlogger>,
) -> Result<Json<ApiResponse<Blogger>>, ApiError> {
    let blogger = state
        .content()
        .upsert_blogger(&identity.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(blogger)))
}

/// POST /bloggers/batch
pub async fn upsert_bloggers_batch(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<BatchBloggersRequest>,
) -> Result<Json<ApiResponse<Vec<Blogger>>>, ApiError> {
    let bloggers = state
        .content()
        .upsert_bloggers(&identity.user_id, payload.bloggers)
        .await?;
    Ok(Json(ApiResponse::success(bloggers)))
}

/// GET /bloggers
pub async fn list_bloggers(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<Blogger>>>, ApiError> {
    let (page, page_size) = query.resolve();
    let (items, total) = state
        .content()
        .list_bloggers(&identity.user_id, page, page_size)
        .await?;

    Ok(Json(ApiResponse::success(Paginated {
        items,
        total,
        page,
        page_size,
    })))
}

/// GET /bloggers/{id}
pub async fn get_blogger(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Blogger>>, ApiError> {
    let blogger = state.content().get_blogger(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(blogger)))
}

/// GET /bloggers/xhs/{xhs_id}
pub async fn get_blogger_by_xhs_id(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(xhs_id): Path<String>,
) -> Result<Json<ApiResponse<Blogger>>, ApiError> {
    let blogger = state
        .content()
        .get_blogger_by_xhs_id(&identity.user_id, &xhs_id)
        .await?;
    Ok(Json(ApiResponse::success(blogger)))
}

/// DELETE /bloggers/{id}
pub async fn delete_blogger(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.content().delete_blogger(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Blogger deleted",
    ))))
}
