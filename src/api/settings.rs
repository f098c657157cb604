use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::db::Settings;
use crate::models::identity::Identity;
use crate::services::SettingsWithUsage;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleCollectionRequest {
    pub enabled: bool,
}

/// GET /settings
/// Stored settings (or defaults) with today's usage
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<SettingsWithUsage>>, ApiError> {
    let settings = state.quota().settings_with_usage(&identity.user_id).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /settings/collection
pub async fn toggle_collection(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<ToggleCollectionRequest>,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    let settings = state
        .quota()
        .set_enabled(&identity.user_id, payload.enabled)
        .await?;
    Ok(Json(ApiResponse::success(settings)))
}
