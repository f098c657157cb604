use std::sync::Arc;
use std::time::Duration;

use crate::clients::auth_center::{AuthCenterClient, IdentityVerifier};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AdminGate, AdminService, ApiKeyService, ContentService, ProvisioningService, QuotaService,
    SeaOrmApiKeyService, SeaOrmQuotaService, SessionIssuer,
};

/// Long-lived collaborators shared by every request. Everything in here is
/// immutable after startup; cross-request coordination goes through the
/// store.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub sessions: SessionIssuer,

    pub admin_gate: Arc<AdminGate>,

    pub provisioning: Arc<ProvisioningService>,

    pub api_keys: Arc<dyn ApiKeyService>,

    pub quota: Arc<dyn QuotaService>,

    pub admin: Arc<AdminService>,

    pub content: Arc<ContentService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let verifier = Arc::new(AuthCenterClient::new(
            &config.auth.auth_center_url,
            Duration::from_secs(config.auth.auth_center_timeout_seconds),
        )?);
        Self::with_verifier(config, verifier).await
    }

    pub async fn with_verifier(
        config: Config,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::from_parts(config, store, verifier)
    }

    pub fn from_parts(
        config: Config,
        store: Store,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> anyhow::Result<Self> {
        let offset = config.general.quota_offset()?;

        let sessions = SessionIssuer::new(&config.auth.session_secret, config.auth.session_ttl_days);
        let admin_gate = Arc::new(AdminGate::new(&config.auth.admin_auth_center_user_ids));
        let provisioning = Arc::new(ProvisioningService::new(verifier, store.clone()));

        let api_keys =
            Arc::new(SeaOrmApiKeyService::new(store.clone())) as Arc<dyn ApiKeyService>;
        let quota = Arc::new(SeaOrmQuotaService::new(
            store.clone(),
            config.quota.clone(),
            offset,
        )) as Arc<dyn QuotaService>;

        let admin = Arc::new(AdminService::new(
            store.clone(),
            api_keys.clone(),
            quota.clone(),
        ));
        let content = Arc::new(ContentService::new(store.clone(), quota.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            sessions,
            admin_gate,
            provisioning,
            api_keys,
            quota,
            admin,
            content,
        })
    }
}
