//! Lookup-or-create of local users from auth-center credentials.

use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::auth_center::{IdentityVerifier, VerifierError};
use crate::db::{Store, User};
use crate::models::identity::{AuthMethod, Identity};
use crate::services::error::AccessError;

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub user: User,
    pub created: bool,
}

impl Provisioned {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user.id.clone(),
            auth_center_user_id: self.user.auth_center_user_id.clone(),
            method: AuthMethod::AuthCenter,
        }
    }
}

#[derive(Clone)]
pub struct ProvisioningService {
    verifier: Arc<dyn IdentityVerifier>,
    store: Store,
}

impl ProvisioningService {
    #[must_use]
    pub fn new(verifier: Arc<dyn IdentityVerifier>, store: Store) -> Self {
        Self { verifier, store }
    }

    /// Resolves an auth-center credential to a local user, creating it on
    /// first use. Concurrent first logins for the same external id converge
    /// on a single row.
    pub async fn provision(&self, token: &str) -> Result<Provisioned, AccessError> {
        let external_id = self.verifier.verify(token).await.map_err(|e| {
            metrics::counter!("auth_failures_total", "kind" => "auth_center").increment(1);
            AccessError::from(e)
        })?;

        if let Some(user) = self.store.get_user_by_auth_center_id(&external_id).await? {
            return Ok(Provisioned {
                user,
                created: false,
            });
        }

        // Nothing has been written yet, so a failure here leaves no trace.
        let profile = self.verifier.fetch_profile(token).await.map_err(|e| {
            warn!(auth_center_user_id = %external_id, error = %e, "Profile fetch failed");
            match e {
                VerifierError::Rejected => {
                    AccessError::UpstreamUnavailable("profile fetch rejected".to_string())
                }
                VerifierError::Unavailable(msg) => AccessError::UpstreamUnavailable(msg),
            }
        })?;

        let (user, created) = self
            .store
            .insert_user_if_absent(&external_id, &profile)
            .await?;

        if created {
            metrics::counter!("users_provisioned_total").increment(1);
            info!(user_id = %user.id, auth_center_user_id = %external_id, "Provisioned new user");
        }

        Ok(Provisioned { user, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::auth_center::ExternalProfile;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeVerifier {
        profile_fails: bool,
        profile_calls: AtomicUsize,
    }

    impl FakeVerifier {
        fn new(profile_fails: bool) -> Self {
            Self {
                profile_fails,
                profile_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn verify(&self, token: &str) -> Result<String, VerifierError> {
            token
                .strip_prefix("valid:")
                .map(ToString::to_string)
                .ok_or(VerifierError::Rejected)
        }

        async fn fetch_profile(&self, _token: &str) -> Result<ExternalProfile, VerifierError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.profile_fails {
                return Err(VerifierError::Unavailable("timeout".to_string()));
            }
            Ok(ExternalProfile {
                union_id: Some("union".to_string()),
                nickname: Some("Nick".to_string()),
                avatar_url: None,
            })
        }
    }

    async fn setup(profile_fails: bool) -> (ProvisioningService, Store, Arc<FakeVerifier>) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1).await.unwrap();
        let verifier = Arc::new(FakeVerifier::new(profile_fails));
        let service = ProvisioningService::new(verifier.clone(), store.clone());
        (service, store, verifier)
    }

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let (service, store, _) = setup(false).await;

        let first = service.provision("valid:ext-1").await.unwrap();
        assert!(first.created);
        assert_eq!(first.user.auth_center_user_id, "ext-1");
        assert_eq!(first.user.nickname.as_deref(), Some("Nick"));
        assert_eq!(first.user.role, "USER");

        let second = service.provision("valid:ext-1").await.unwrap();
        assert!(!second.created);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_create_one_user() {
        let (service, store, verifier) = setup(false).await;

        let attempts = (0..8).map(|_| service.provision("valid:ext-race"));
        let results = futures::future::join_all(attempts).await;

        let ids: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().user.id)
            .collect();
        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(store.user_count().await.unwrap(), 1);
        assert!(verifier.profile_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_rejected_credential() {
        let (service, store, _) = setup(false).await;

        let err = service.provision("forged").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidCredential));
        assert_eq!(store.user_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_profile_failure_leaves_nothing_behind() {
        let (service, store, _) = setup(true).await;

        let err = service.provision("valid:ext-2").await.unwrap_err();
        assert!(matches!(err, AccessError::UpstreamUnavailable(_)));
        assert_eq!(store.user_count().await.unwrap(), 0);
    }
}
