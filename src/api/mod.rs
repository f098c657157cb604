use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AdminGate, AdminService, ApiKeyService, ContentService, ProvisioningService, QuotaService,
    SessionIssuer,
};
use crate::state::SharedState;

mod admin;
mod api_keys;
pub mod auth;
mod bloggers;
mod error;
mod notes;
mod observability;
mod settings;
mod types;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.shared.sessions
    }

    #[must_use]
    pub fn admin_gate(&self) -> &AdminGate {
        &self.shared.admin_gate
    }

    #[must_use]
    pub fn provisioning(&self) -> &ProvisioningService {
        &self.shared.provisioning
    }

    #[must_use]
    pub fn api_keys(&self) -> &dyn ApiKeyService {
        self.shared.api_keys.as_ref()
    }

    #[must_use]
    pub fn quota(&self) -> &dyn QuotaService {
        self.shared.quota.as_ref()
    }

    #[must_use]
    pub fn admin(&self) -> &AdminService {
        &self.shared.admin
    }

    #[must_use]
    pub fn content(&self) -> &ContentService {
        &self.shared.content
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(create_auth_center_router(state.clone()))
        .merge(create_protected_router(state.clone()))
        .merge(create_admin_router(state.clone()))
        .route("/admin/check", get(auth::admin_check))
        .route("/health", get(observability::health))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

/// Routes authenticated directly against the auth center.
fn create_auth_center_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/session", post(auth::create_session))
        .route("/user/me", get(auth::user_me))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::auth_center_middleware,
        ))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::auth_me))
        .route("/api-keys", get(api_keys::list_api_keys))
        .route("/api-keys", post(api_keys::create_api_key))
        .route("/api-keys/current", get(api_keys::current_api_key))
        .route("/api-keys/stats", get(api_keys::api_key_stats))
        .route("/api-keys/validate", get(api_keys::validate_api_key))
        .route("/api-keys/{id}", delete(api_keys::delete_api_key))
        .route(
            "/api-keys/{id}/deactivate",
            post(api_keys::deactivate_api_key),
        )
        .route(
            "/api-keys/{id}/expiry",
            put(api_keys::update_api_key_expiry),
        )
        .route("/settings", get(settings::get_settings))
        .route("/settings/collection", put(settings::toggle_collection))
        .route("/notes", get(notes::list_notes))
        .route("/notes", post(notes::create_note))
        .route("/notes/batch", post(notes::create_notes_batch))
        .route(
            "/notes/{id}",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route("/bloggers", get(bloggers::list_bloggers))
        .route("/bloggers", post(bloggers::upsert_blogger))
        .route("/bloggers/batch", post(bloggers::upsert_bloggers_batch))
        .route(
            "/bloggers/{id}",
            get(bloggers::get_blogger).delete(bloggers::delete_blogger),
        )
        .route(
            "/bloggers/xhs/{xhs_id}",
            get(bloggers::get_blogger_by_xhs_id),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

/// Layers run outside-in in reverse order: authenticate first, then gate.
fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", get(admin::get_user_detail))
        .route(
            "/admin/users/{id}/settings",
            put(admin::update_user_settings),
        )
        .route(
            "/admin/users/{id}/api-key",
            post(admin::create_api_key_for_user),
        )
        .route(
            "/admin/api-keys/{id}/expiry",
            put(admin::update_api_key_expiry),
        )
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::admin_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
