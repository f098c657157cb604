use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::ApiKeyStats;
use crate::models::identity::Identity;
use crate::services::ApiKeyView;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub name: String,
    /// Days until expiry. Absent or non-positive means never.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpiryRequest {
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub user_id: String,
}

/// POST /api-keys
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> Result<Json<ApiResponse<ApiKeyView>>, ApiError> {
    let key = state
        .api_keys()
        .create(&identity.user_id, &payload.name, payload.expires_in)
        .await?;

    Ok(Json(ApiResponse::success(key)))
}

/// GET /api-keys
pub async fn list_api_keys(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<Vec<ApiKeyView>>>, ApiError> {
    let keys = state.api_keys().list(&identity.user_id).await?;
    Ok(Json(ApiResponse::success(keys)))
}

/// GET /api-keys/current
/// The caller's active key; 404 when an admin has not issued one yet
pub async fn current_api_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<ApiKeyView>>, ApiError> {
    let key = state.api_keys().current(&identity.user_id).await?;
    Ok(Json(ApiResponse::success(key)))
}

/// GET /api-keys/stats
pub async fn api_key_stats(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<ApiKeyStats>>, ApiError> {
    let stats = state.api_keys().stats(&identity.user_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// GET /api-keys/validate
/// Reaching the handler means the credential was accepted
pub async fn validate_api_key(
    Extension(identity): Extension<Identity>,
) -> Json<ApiResponse<ValidateResponse>> {
    Json(ApiResponse::success(ValidateResponse {
        user_id: identity.user_id,
    }))
}

/// POST /api-keys/{id}/deactivate
pub async fn deactivate_api_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.api_keys().deactivate(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "API key deactivated",
    ))))
}

/// DELETE /api-keys/{id}
pub async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.api_keys().delete(&identity.user_id, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "API key deleted",
    ))))
}

/// PUT /api-keys/{id}/expiry
pub async fn update_api_key_expiry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateExpiryRequest>,
) -> Result<Json<ApiResponse<ApiKeyView>>, ApiError> {
    let key = state
        .api_keys()
        .update_expiry(&identity.user_id, &id, payload.expires_in)
        .await?;
    Ok(Json(ApiResponse::success(key)))
}
