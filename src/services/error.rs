//! Error taxonomy shared by the identity, key and quota services.

use thiserror::Error;

use crate::clients::auth_center::VerifierError;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid session token")]
    TokenInvalid,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Auth center unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("An active API key already exists")]
    MaxKeysReached,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("Resource belongs to another user")]
    PermissionDenied,

    #[error("Collection is disabled for this account")]
    CollectionDisabled,

    #[error("Batch of {requested} exceeds the per-batch limit of {limit}")]
    BatchLimitExceeded { requested: usize, limit: i32 },

    #[error("Daily limit of {limit} reached ({used} collected today, {requested} requested)")]
    DailyLimitExceeded {
        used: u64,
        requested: usize,
        limit: i32,
    },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Stable label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::MaxKeysReached => "max_keys_reached",
            Self::InvalidKey => "invalid_key",
            Self::PermissionDenied => "permission_denied",
            Self::CollectionDisabled => "collection_disabled",
            Self::BatchLimitExceeded { .. } => "batch_limit_exceeded",
            Self::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Database(_) => "database",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sea_orm::DbErr> for AccessError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccessError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<VerifierError> for AccessError {
    fn from(err: VerifierError) -> Self {
        match err {
            VerifierError::Rejected => Self::InvalidCredential,
            VerifierError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
        }
    }
}
