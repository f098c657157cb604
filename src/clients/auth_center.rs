use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_AUTH_CENTER_URL: &str = "https://os.crazyaigc.com";

#[derive(Debug, Error)]
pub enum VerifierError {
    /// The auth center answered and said no.
    #[error("credential rejected by auth center")]
    Rejected,

    /// Network failure, timeout, 5xx or a response we could not parse.
    #[error("auth center unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for VerifierError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Profile attributes cached on the local user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    pub union_id: Option<String>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

/// Exchanges bearer credentials issued by the account service.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the external user id the token belongs to.
    async fn verify(&self, token: &str) -> Result<String, VerifierError>;

    async fn fetch_profile(&self, token: &str) -> Result<ExternalProfile, VerifierError>;
}

#[derive(Debug, Serialize)]
struct VerifyTokenRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifiedToken {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    #[serde(default)]
    union_id: Option<String>,
    #[serde(default)]
    profile: Option<UserProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct AuthCenterClient {
    client: Client,
    base_url: String,
}

impl AuthCenterClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("notegate/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Reads a JSON envelope. 4xx bodies count as a rejection, anything else
    /// that fails to parse is treated as the service being unavailable.
    async fn read_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, VerifierError> {
        let status = response.status();
        if status.is_server_error() {
            return Err(VerifierError::Unavailable(format!("status {status}")));
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if status.is_client_error() || status == StatusCode::UNAUTHORIZED => {
                Err(VerifierError::Rejected)
            }
            Err(e) => Err(VerifierError::Unavailable(format!(
                "unparsable response ({status}): {e}"
            ))),
        }
    }
}

#[async_trait]
impl IdentityVerifier for AuthCenterClient {
    async fn verify(&self, token: &str) -> Result<String, VerifierError> {
        if token.trim().is_empty() {
            return Err(VerifierError::Rejected);
        }

        let url = format!("{}/api/auth/verify-token", self.base_url);
        debug!("Verifying token with auth center");

        let response = self
            .client
            .post(url)
            .json(&VerifyTokenRequest { token })
            .send()
            .await?;

        let envelope: Envelope<VerifiedToken> = Self::read_envelope(response).await?;

        match envelope.data {
            Some(data) if envelope.success && !data.user_id.is_empty() => Ok(data.user_id),
            _ => Err(VerifierError::Rejected),
        }
    }

    async fn fetch_profile(&self, token: &str) -> Result<ExternalProfile, VerifierError> {
        let url = format!("{}/api/auth/user-info", self.base_url);
        debug!("Fetching profile from auth center");

        let response = self.client.get(url).bearer_auth(token).send().await?;

        let envelope: Envelope<UserInfo> = Self::read_envelope(response).await?;

        let info = match envelope.data {
            Some(info) if envelope.success => info,
            _ => return Err(VerifierError::Rejected),
        };
        let profile = info.profile.unwrap_or_default();

        Ok(ExternalProfile {
            union_id: non_empty(info.union_id),
            nickname: non_empty(profile.nickname),
            avatar_url: non_empty(profile.avatar_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> AuthCenterClient {
        AuthCenterClient::new(&server.base_url(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_verify_returns_user_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/auth/verify-token")
                    .json_body(json!({ "token": "good" }));
                then.status(200)
                    .json_body(json!({ "success": true, "data": { "userId": "ac-1", "unionId": "un-1" } }));
            })
            .await;

        let user_id = client_for(&server).verify("good").await.unwrap();

        assert_eq!(user_id, "ac-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_unsuccessful_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/verify-token");
                then.status(401)
                    .json_body(json!({ "success": false, "error": "token invalid" }));
            })
            .await;

        let err = client_for(&server).verify("bad").await.unwrap_err();
        assert!(matches!(err, VerifierError::Rejected));
    }

    #[tokio::test]
    async fn test_verify_server_error_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/verify-token");
                then.status(503).body("maintenance");
            })
            .await;

        let err = client_for(&server).verify("any").await.unwrap_err();
        assert!(matches!(err, VerifierError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_verify_garbage_body_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/verify-token");
                then.status(200).body("<html>proxy</html>");
            })
            .await;

        let err = client_for(&server).verify("any").await.unwrap_err();
        assert!(matches!(err, VerifierError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_verify_timeout_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth/verify-token");
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .json_body(json!({ "success": true, "data": { "userId": "ac-1" } }));
            })
            .await;

        let client = AuthCenterClient::new(&server.base_url(), Duration::from_millis(50)).unwrap();
        let err = client.verify("slow").await.unwrap_err();
        assert!(matches!(err, VerifierError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_token_rejected_without_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let err = client_for(&server).verify("  ").await.unwrap_err();
        assert!(matches!(err, VerifierError::Rejected));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_fetch_profile_maps_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/auth/user-info")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "success": true,
                    "data": {
                        "userId": "ac-1",
                        "unionId": "un-1",
                        "phoneNumber": "123",
                        "profile": { "nickname": "Lin", "avatarUrl": "" }
                    }
                }));
            })
            .await;

        let profile = client_for(&server).fetch_profile("tok").await.unwrap();

        assert_eq!(
            profile,
            ExternalProfile {
                union_id: Some("un-1".to_string()),
                nickname: Some("Lin".to_string()),
                avatar_url: None,
            }
        );
    }
}
