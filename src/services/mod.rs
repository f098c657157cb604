pub mod error;
pub use error::AccessError;

pub mod session;
pub use session::{IssuedSession, SessionIssuer};

pub mod provisioning;
pub use provisioning::{Provisioned, ProvisioningService};

pub mod api_key_service;
pub mod api_key_service_impl;
pub use api_key_service::{ApiKeyService, ApiKeyView, mask_api_key};
pub use api_key_service_impl::SeaOrmApiKeyService;

pub mod quota_service;
pub mod quota_service_impl;
pub use quota_service::{QuotaService, SettingsWithUsage};
pub use quota_service_impl::SeaOrmQuotaService;

pub mod admin;
pub use admin::{AdminGate, AdminService, UserDetail, UserPage};

pub mod content_service;
pub use content_service::ContentService;
