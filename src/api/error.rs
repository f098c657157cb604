use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::AccessError;

/// Message shared by "does not exist" and "belongs to someone else" so the
/// two cannot be told apart from outside.
const NOT_FOUND_MESSAGE: &str = "Resource not found";

#[derive(Debug)]
pub enum ApiError {
    Internal(String),

    Access(AccessError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Access(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApiError {}

fn access_response(err: &AccessError) -> (StatusCode, String) {
    match err {
        AccessError::InvalidCredential
        | AccessError::TokenInvalid
        | AccessError::TokenExpired
        | AccessError::InvalidKey
        | AccessError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),

        AccessError::Forbidden | AccessError::CollectionDisabled => {
            (StatusCode::FORBIDDEN, err.to_string())
        }

        AccessError::PermissionDenied => {
            tracing::warn!(kind = err.kind(), "Ownership check failed");
            (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
        }
        AccessError::NotFound(what) => {
            tracing::debug!(kind = err.kind(), resource = %what, "Resource missing");
            (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
        }

        AccessError::MaxKeysReached => (StatusCode::CONFLICT, err.to_string()),
        AccessError::BatchLimitExceeded { .. } | AccessError::Validation(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        AccessError::DailyLimitExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),

        AccessError::UpstreamUnavailable(msg) => {
            tracing::warn!("Auth center error: {}", msg);
            (
                StatusCode::BAD_GATEWAY,
                "Auth center is unavailable".to_string(),
            )
        }

        AccessError::Database(msg) => {
            tracing::error!("Database error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A database error occurred".to_string(),
            )
        }
        AccessError::Internal(msg) => {
            tracing::error!("Internal error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match &self {
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    "internal",
                )
            }
            Self::Access(err) => {
                let (status, message) = access_response(err);
                // Ownership failures share the not-found code as well as the message.
                let code = match err {
                    AccessError::PermissionDenied => "not_found",
                    other => other.kind(),
                };
                (status, message, code)
            }
        };

        let body = ApiResponse::<()>::error(message, code);
        (status, Json(body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        Self::Access(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AccessError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(AccessError::TokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AccessError::InvalidKey), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AccessError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AccessError::CollectionDisabled), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AccessError::MaxKeysReached), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AccessError::BatchLimitExceeded {
                requested: 51,
                limit: 50
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AccessError::DailyLimitExceeded {
                used: 470,
                requested: 50,
                limit: 500
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(AccessError::UpstreamUnavailable("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AccessError::Database("locked".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = ApiError::from(anyhow::anyhow!("disk on fire"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ownership_and_missing_look_the_same() {
        let denied = access_response(&AccessError::PermissionDenied);
        let missing = access_response(&AccessError::NotFound("API key".into()));
        assert_eq!(denied, missing);
    }
}
