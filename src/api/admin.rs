use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, PageQuery};
use crate::db::{Settings, SettingsPatch};
use crate::services::{ApiKeyView, UserDetail, UserPage};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserSettingsRequest {
    #[serde(default)]
    pub collection_daily_limit: Option<i32>,
    #[serde(default)]
    pub collection_batch_limit: Option<i32>,
    #[serde(default)]
    pub collection_enabled: Option<bool>,
}

impl From<UpdateUserSettingsRequest> for SettingsPatch {
    fn from(req: UpdateUserSettingsRequest) -> Self {
        Self {
            daily_limit: req.collection_daily_limit,
            batch_limit: req.collection_batch_limit,
            collection_enabled: req.collection_enabled,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminKeyRequest {
    /// Days until expiry. Absent or non-positive means never.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<UserPage>>, ApiError> {
    let (page, page_size) = query.resolve();
    let users = state.admin().list_users(page, page_size).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// GET /admin/users/{id}
pub async fn get_user_detail(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserDetail>>, ApiError> {
    let detail = state.admin().user_detail(&user_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// PUT /admin/users/{id}/settings
/// Negative limits are ignored; at least one field must be present
pub async fn update_user_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserSettingsRequest>,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    let patch = SettingsPatch::from(payload);
    let settings = state.admin().update_settings(&user_id, &patch).await?;

    tracing::info!(target_user = %user_id, "Admin updated collection settings");
    Ok(Json(ApiResponse::success(settings)))
}

/// POST /admin/users/{id}/api-key
pub async fn create_api_key_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Option<Json<AdminKeyRequest>>,
) -> Result<Json<ApiResponse<ApiKeyView>>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let key = state
        .admin()
        .create_key_for_user(&user_id, payload.expires_in)
        .await?;

    tracing::info!(target_user = %user_id, key_id = %key.id, "Admin issued API key");
    Ok(Json(ApiResponse::success(key)))
}

/// PUT /admin/api-keys/{id}/expiry
pub async fn update_api_key_expiry(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
    Json(payload): Json<AdminKeyRequest>,
) -> Result<Json<ApiResponse<ApiKeyView>>, ApiError> {
    let key = state
        .admin()
        .update_key_expiry(&key_id, payload.expires_in)
        .await?;
    Ok(Json(ApiResponse::success(key)))
}
