//! Local session tokens.
//!
//! HS256 JWTs carrying the local user id. Validation pins the algorithm so a
//! token signed with any other algorithm is rejected even when the signature
//! would otherwise check out.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::error::AccessError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims {
    user_id: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller-supplied clock in `parse_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<IssuedSession, AccessError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<IssuedSession, AccessError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            user_id: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AccessError::Internal(format!("Failed to sign session token: {e}")))?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Returns the local user id carried by the token.
    pub fn parse(&self, token: &str) -> Result<String, AccessError> {
        self.parse_at(token, Utc::now())
    }

    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, AccessError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AccessError::TokenExpired,
                _ => {
                    debug!(error = %e, "Rejected session token");
                    AccessError::TokenInvalid
                }
            },
        )?;

        if data.claims.exp <= now.timestamp() {
            return Err(AccessError::TokenExpired);
        }
        if data.claims.user_id.is_empty() {
            return Err(AccessError::TokenInvalid);
        }

        Ok(data.claims.user_id)
    }

    /// Degrades any missing or invalid token to anonymous.
    #[must_use]
    pub fn parse_optional(&self, token: Option<&str>) -> Option<String> {
        token.and_then(|t| self.parse(t).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new("test-secret", 7)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_then_parse() {
        let session = issuer().issue_at("user-1", t0()).unwrap();
        assert_eq!(session.expires_at, t0() + Duration::days(7));

        let user_id = issuer()
            .parse_at(&session.token, t0() + Duration::days(6))
            .unwrap();
        assert_eq!(user_id, "user-1");
    }

    #[test]
    fn test_expired_token() {
        let session = issuer().issue_at("user-1", t0()).unwrap();
        let err = issuer()
            .parse_at(&session.token, t0() + Duration::days(7) + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, AccessError::TokenExpired));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let session = SessionIssuer::new("other-secret", 7)
            .issue_at("user-1", t0())
            .unwrap();
        let err = issuer().parse_at(&session.token, t0()).unwrap_err();
        assert!(matches!(err, AccessError::TokenInvalid));
    }

    #[test]
    fn test_flipped_payload_rejected() {
        let session = issuer().issue_at("user-1", t0()).unwrap();
        let mut parts: Vec<String> = session.token.split('.').map(String::from).collect();
        let payload = &parts[1];
        let flipped = if payload.starts_with('e') { "f" } else { "e" };
        parts[1] = format!("{flipped}{}", &payload[1..]);
        let tampered = parts.join(".");

        let err = issuer().parse_at(&tampered, t0()).unwrap_err();
        assert!(matches!(err, AccessError::TokenInvalid));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = SessionClaims {
            user_id: "user-1".to_string(),
            iat: t0().timestamp(),
            exp: (t0() + Duration::days(7)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let err = issuer().parse_at(&token, t0()).unwrap_err();
        assert!(matches!(err, AccessError::TokenInvalid));
    }

    #[test]
    fn test_garbage_rejected() {
        let err = issuer().parse_at("not.a.jwt", t0()).unwrap_err();
        assert!(matches!(err, AccessError::TokenInvalid));
    }

    #[test]
    fn test_optional_mode_degrades() {
        let issuer = issuer();
        assert_eq!(issuer.parse_optional(None), None);
        assert_eq!(issuer.parse_optional(Some("junk")), None);

        let session = issuer.issue("user-2").unwrap();
        assert_eq!(
            issuer.parse_optional(Some(&session.token)),
            Some("user-2".to_string())
        );
    }
}
