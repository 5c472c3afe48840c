use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_token_ttl_minutes() -> u64 {
    30
}

fn default_ping_interval_secs() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            live: LiveConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes.saturating_mul(60))
    }
}

impl LiveConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("POSTLINE_CONFIG").map(PathBuf::from).ok();

        let mut config = match config_path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(&path)?)?,
            None => ServerConfig::default(),
        };

        if let Ok(addr) = std::env::var("POSTLINE_BIND_ADDR") {
            config.bind_addr = addr.parse()?;
        }
        if let Ok(secret) = std::env::var("POSTLINE_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(val) = std::env::var("POSTLINE_TOKEN_TTL_MINUTES") {
            config.auth.token_ttl_minutes = val.parse()?;
        }
        if let Ok(origins) = std::env::var("POSTLINE_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(val) = std::env::var("POSTLINE_PING_INTERVAL_SECS") {
            config.live.ping_interval_secs = val.parse()?;
        }
        if let Ok(cert) = std::env::var("POSTLINE_TLS_CERT") {
            config.tls.cert_path = Some(cert);
        }
        if let Ok(key) = std::env::var("POSTLINE_TLS_KEY") {
            config.tls.key_path = Some(key);
        }

        if config.auth.jwt_secret.is_empty() {
            config.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
            tracing::warn!(
                "No JWT secret configured. Generated random secret \
                 (issued tokens will not survive a restart)."
            );
        }
        config.check_secret()?;
        config.check_token_ttl()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn check_token_ttl(&self) -> anyhow::Result<()> {
        // One year.
        const MAX_TOKEN_TTL_MINUTES: u64 = 365 * 24 * 60;
        let minutes = self.auth.token_ttl_minutes;
        if minutes == 0 || minutes > MAX_TOKEN_TTL_MINUTES {
            anyhow::bail!(
                "Token TTL must be between 1 and {MAX_TOKEN_TTL_MINUTES} minutes, got {minutes}."
            );
        }
        Ok(())
    }

    fn check_secret(&self) -> anyhow::Result<()> {
        const WEAK_SECRETS: &[&str] = &[
            "change-me-to-a-random-secret",
            "secret",
            "password",
            "jwt-secret",
            "SECRET_KEY",
        ];
        if WEAK_SECRETS.contains(&self.auth.jwt_secret.as_str()) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via POSTLINE_JWT_SECRET."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via POSTLINE_JWT_SECRET."
            );
        }
        Ok(())
    }
}
