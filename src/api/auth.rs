use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::constants::headers::API_KEY;
use crate::db::User;
use crate::models::identity::{AuthMethod, Identity};
use crate::services::{AccessError, Provisioned};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
    pub is_admin: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub user: User,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
}

// ============================================================================
// Middleware
// ============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn api_key_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

fn record_failure(err: AccessError) -> ApiError {
    metrics::counter!("auth_failures_total", "kind" => err.kind()).increment(1);
    tracing::debug!(kind = err.kind(), "Authentication failed");
    ApiError::from(err)
}

/// Resolves local credentials. A session bearer token takes precedence over
/// `X-API-Key` when both are sent.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AccessError> {
    if let Some(token) = bearer_token(headers) {
        let user_id = state.sessions().parse(token)?;
        let user = state
            .store()
            .get_user(&user_id)
            .await?
            .ok_or(AccessError::Unauthenticated)?;

        return Ok(Identity {
            user_id: user.id,
            auth_center_user_id: user.auth_center_user_id,
            method: AuthMethod::Session,
        });
    }

    if let Some(key) = api_key_header(headers) {
        return state.api_keys().validate(key).await;
    }

    Err(AccessError::Unauthenticated)
}

/// Authentication middleware that accepts either:
/// 1. `Authorization: Bearer <session token>`
/// 2. `X-API-Key: <secret>`
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = authenticate(&state, request.headers())
        .await
        .map_err(record_failure)?;

    tracing::Span::current().record("user_id", identity.user_id.as_str());
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Verifies an auth-center credential on every request, provisioning the
/// local user on first sight.
pub async fn auth_center_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .ok_or(AccessError::InvalidCredential)
        .map_err(record_failure)?
        .to_string();

    let provisioned = state.provisioning().provision(&token).await?;

    tracing::Span::current().record("user_id", provisioned.user.id.as_str());
    request.extensions_mut().insert(provisioned.identity());
    request.extensions_mut().insert(provisioned);

    Ok(next.run(request).await)
}

/// Must run after one of the authenticating middlewares.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state
        .admin_gate()
        .authorize(request.extensions().get::<Identity>())
        .map_err(record_failure)?;

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/session
/// Exchanges an auth-center credential for a local session token
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(provisioned): Extension<Provisioned>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions().issue(&provisioned.user.id)?;
    let is_admin = state
        .admin_gate()
        .is_admin(&provisioned.user.auth_center_user_id);

    tracing::info!(user_id = %provisioned.user.id, created = provisioned.created, "Session issued");

    Ok(Json(ApiResponse::success(SessionResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: provisioned.user,
        is_admin,
    })))
}

/// GET /user/me
/// Current user as seen through the auth center
pub async fn user_me(
    State(state): State<Arc<AppState>>,
    Extension(provisioned): Extension<Provisioned>,
) -> Json<ApiResponse<CurrentUserResponse>> {
    let is_admin = state
        .admin_gate()
        .is_admin(&provisioned.user.auth_center_user_id);

    Json(ApiResponse::success(CurrentUserResponse {
        user: provisioned.user,
        is_admin,
        auth_method: Some(AuthMethod::AuthCenter),
    }))
}

/// GET /auth/me
/// Current user for a local session or API key
pub async fn auth_me(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ApiResponse<CurrentUserResponse>>, ApiError> {
    let user = state
        .store()
        .get_user(&identity.user_id)
        .await?
        .ok_or(AccessError::Unauthenticated)?;
    let is_admin = state.admin_gate().is_admin(&user.auth_center_user_id);

    Ok(Json(ApiResponse::success(CurrentUserResponse {
        user,
        is_admin,
        auth_method: Some(identity.method),
    })))
}

/// GET /admin/check
/// Never rejects: missing or invalid sessions simply report `isAdmin: false`
pub async fn admin_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<AdminCheckResponse>>, ApiError> {
    let Some(user_id) = state.sessions().parse_optional(bearer_token(&headers)) else {
        return Ok(Json(ApiResponse::success(AdminCheckResponse { is_admin: false })));
    };

    let is_admin = state
        .store()
        .get_user(&user_id)
        .await?
        .is_some_and(|user| state.admin_gate().is_admin(&user.auth_center_user_id));

    Ok(Json(ApiResponse::success(AdminCheckResponse { is_admin })))
}
