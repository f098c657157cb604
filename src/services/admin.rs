//! Admin allow-list gate and the administrative overrides behind it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::db::{Settings, SettingsPatch, Store, User};
use crate::models::identity::Identity;
use crate::services::api_key_service::{ApiKeyService, ApiKeyView};
use crate::services::error::AccessError;
use crate::services::quota_service::QuotaService;

/// Static membership check over auth-center user ids, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    allow_list: HashSet<String>,
}

impl AdminGate {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allow_list = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { allow_list }
    }

    #[must_use]
    pub fn is_admin(&self, auth_center_user_id: &str) -> bool {
        !auth_center_user_id.is_empty() && self.allow_list.contains(auth_center_user_id)
    }

    pub fn authorize(&self, identity: Option<&Identity>) -> Result<(), AccessError> {
        let identity = identity.ok_or(AccessError::Unauthenticated)?;

        if self.is_admin(&identity.auth_center_user_id) {
            Ok(())
        } else {
            warn!(user_id = %identity.user_id, "Admin access denied");
            Err(AccessError::Forbidden)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub has_api_key: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub items: Vec<UserSummary>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: User,
    pub settings: Settings,
    pub api_keys: Vec<ApiKeyView>,
}

pub struct AdminService {
    store: Store,
    api_keys: Arc<dyn ApiKeyService>,
    quota: Arc<dyn QuotaService>,
}

impl AdminService {
    #[must_use]
    pub fn new(
        store: Store,
        api_keys: Arc<dyn ApiKeyService>,
        quota: Arc<dyn QuotaService>,
    ) -> Self {
        Self {
            store,
            api_keys,
            quota,
        }
    }

    async fn require_user(&self, user_id: &str) -> Result<User, AccessError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AccessError::NotFound("User".to_string()))
    }

    pub async fn list_users(&self, page: u64, page_size: u64) -> Result<UserPage, AccessError> {
        let (users, total) = self.store.list_users(page, page_size).await?;

        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
        let with_key = self.store.users_with_live_api_key(&ids, Utc::now()).await?;

        let items = users
            .into_iter()
            .map(|user| {
                let has_api_key = with_key.contains(&user.id);
                UserSummary { user, has_api_key }
            })
            .collect();

        Ok(UserPage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub async fn user_detail(&self, user_id: &str) -> Result<UserDetail, AccessError> {
        let user = self.require_user(user_id).await?;
        let settings = self.quota.settings(user_id).await?;
        let api_keys = self.api_keys.list(user_id).await?;

        Ok(UserDetail {
            user,
            settings,
            api_keys,
        })
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Settings, AccessError> {
        self.require_user(user_id).await?;
        self.quota.update_settings(user_id, patch).await
    }

    pub async fn create_key_for_user(
        &self,
        user_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        self.api_keys.create_for_user(user_id, expires_in_days).await
    }

    pub async fn update_key_expiry(
        &self,
        key_id: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKeyView, AccessError> {
        self.api_keys
            .admin_update_expiry(key_id, expires_in_days)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::AuthMethod;

    fn identity(external: &str) -> Identity {
        Identity {
            user_id: "local".to_string(),
            auth_center_user_id: external.to_string(),
            method: AuthMethod::Session,
        }
    }

    #[test]
    fn test_allow_listed_identity_passes() {
        let gate = AdminGate::new(["admin-1", " admin-2 "]);
        assert!(gate.authorize(Some(&identity("admin-1"))).is_ok());
        assert!(gate.authorize(Some(&identity("admin-2"))).is_ok());
    }

    #[test]
    fn test_other_identities_are_forbidden() {
        let gate = AdminGate::new(["admin-1", ""]);
        assert!(matches!(
            gate.authorize(Some(&identity("someone"))),
            Err(AccessError::Forbidden)
        ));
        assert!(matches!(
            gate.authorize(Some(&identity(""))),
            Err(AccessError::Forbidden)
        ));
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let gate = AdminGate::new(["admin-1"]);
        assert!(matches!(
            gate.authorize(None),
            Err(AccessError::Unauthenticated)
        ));
    }

    #[test]
    fn test_empty_allow_list_denies_everyone() {
        let gate = AdminGate::new(Vec::<String>::new());
        assert!(!gate.is_admin("admin-1"));
        assert!(!gate.is_admin(""));
    }

    #[tokio::test]
    async fn test_list_users_ignores_expired_keys() {
        use crate::clients::auth_center::ExternalProfile;
        use crate::config::QuotaConfig;
        use crate::services::api_key_service_impl::SeaOrmApiKeyService;
        use crate::services::quota_service_impl::SeaOrmQuotaService;
        use chrono::{Duration, FixedOffset};

        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let profile = ExternalProfile::default();
        let (live, _) = store.insert_user_if_absent("ext-live", &profile).await.unwrap();
        let (stale, _) = store.insert_user_if_absent("ext-stale", &profile).await.unwrap();
        let (bare, _) = store.insert_user_if_absent("ext-bare", &profile).await.unwrap();

        let now = Utc::now();
        store
            .insert_api_key(&live.id, "k", "eb_live", Some(now + Duration::days(1)))
            .await
            .unwrap();
        store
            .insert_api_key(&stale.id, "k", "eb_stale", Some(now - Duration::days(1)))
            .await
            .unwrap();

        let admin = AdminService::new(
            store.clone(),
            Arc::new(SeaOrmApiKeyService::new(store.clone())),
            Arc::new(SeaOrmQuotaService::new(
                store.clone(),
                QuotaConfig::default(),
                FixedOffset::east_opt(0).unwrap(),
            )),
        );

        let page = admin.list_users(1, 10).await.unwrap();
        assert_eq!(page.total, 3);
        let flag = |id: &str| {
            page.items
                .iter()
                .find(|s| s.user.id == id)
                .map(|s| s.has_api_key)
                .unwrap()
        };
        assert!(flag(&live.id));
        assert!(!flag(&stale.id));
        assert!(!flag(&bare.id));
    }
}
