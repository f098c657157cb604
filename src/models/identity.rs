use serde::Serialize;

/// How the caller proved who they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Local session token issued after a successful exchange.
    Session,
    /// Machine credential presented in `X-API-Key`.
    ApiKey,
    /// Auth-center credential verified on this request.
    AuthCenter,
}

/// Request-scoped identity, placed in request extensions by the auth
/// middleware and read by handlers and the admin gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub auth_center_user_id: String,
    pub method: AuthMethod,
}
