use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub quota: QuotaConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 4)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,

    /// UTC offset of the calendar day used as the daily quota window,
    /// e.g. `+08:00`.
    pub quota_utc_offset: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/notegate.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 4,
            max_db_connections: 5,
            min_db_connections: 1,
            quota_utc_offset: "+08:00".to_string(),
        }
    }
}

impl GeneralConfig {
    pub fn quota_offset(&self) -> Result<FixedOffset> {
        self.quota_utc_offset
            .parse::<FixedOffset>()
            .map_err(|e| anyhow::anyhow!("Invalid quota_utc_offset '{}': {e}", self.quota_utc_offset))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for local session tokens. Must be set; an empty value is
    /// rejected at startup.
    #[serde(skip_serializing)]
    pub session_secret: String,

    pub session_ttl_days: i64,

    /// Auth-center user ids allowed into the admin surface.
    pub admin_auth_center_user_ids: Vec<String>,

    pub auth_center_url: String,

    pub auth_center_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            session_ttl_days: 7,
            admin_auth_center_user_ids: Vec::new(),
            auth_center_url: crate::clients::auth_center::DEFAULT_AUTH_CENTER_URL.to_string(),
            auth_center_timeout_seconds: 10,
        }
    }
}

/// Defaults applied to users without a persisted settings row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub collection_enabled: bool,

    pub daily_limit: i32,

    pub batch_limit: i32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            collection_enabled: false,
            daily_limit: 500,
            batch_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

/// Splits a comma separated id list, trimming and dropping empty entries.
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl Config {
    /// Loads the first config file found, then applies `.env` and process
    /// environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty("SESSION_SECRET").or_else(|| non_empty("JWT_SECRET")) {
            self.auth.session_secret = secret;
        }
        if let Some(url) = non_empty("AUTH_CENTER_URL") {
            self.auth.auth_center_url = url;
        }
        if let Some(ids) = non_empty("EDIT_ADMIN_AUTH_CENTER_USER_IDS") {
            self.auth.admin_auth_center_user_ids = parse_id_list(&ids);
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            self.general.database_url = url;
        }
        if let Some(host) = non_empty("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("notegate").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".notegate").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.session_secret.trim().is_empty() {
            anyhow::bail!("auth.session_secret (or SESSION_SECRET) must be set");
        }

        if self.auth.session_ttl_days <= 0 {
            anyhow::bail!("auth.session_ttl_days must be > 0");
        }

        if self.auth.auth_center_url.is_empty() {
            anyhow::bail!("auth.auth_center_url cannot be empty");
        }
        url::Url::parse(&self.auth.auth_center_url).context("Invalid auth.auth_center_url")?;

        if self.auth.auth_center_timeout_seconds == 0 {
            anyhow::bail!("auth.auth_center_timeout_seconds must be > 0");
        }

        self.general.quota_offset()?;

        Ok(())
    }
}
