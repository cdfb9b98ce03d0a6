use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::OutboxConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared secret the scheduler presents when triggering a run.
    pub cron_secret: String,
}

/// Where rendered links point and which domain Message-IDs use.
#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub mail_domain: String,
}

/// Chat workspace API (Slack-compatible `chat.postMessage`).
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub api_url: String,
    pub token: String,
    /// Channel that receives new-ticket announcements.
    #[serde(default)]
    pub team_channel: Option<String>,
}

/// Transactional email HTTP API.
#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    pub portal: PortalConfig,
    /// Absent means chat delivery is not configured.
    #[serde(default)]
    pub chat: Option<ChatConfig>,
    /// Absent means email delivery is not configured.
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("HELPDESK_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("outbox.batch_size", 10_i64)?
            .set_default("outbox.max_events_per_run", 50_i64)?
            .set_default("outbox.max_attempts", 3_i64)?
            .set_default("outbox.handler_timeout_secs", 15_i64)?
            .set_default("outbox.stuck_after_secs", 600_i64)?
            .set_default("portal.base_url", "http://localhost:3000")?
            .set_default("portal.mail_domain", "helpdesk.localhost")?
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., HELPDESK__AUTH__CRON_SECRET)
            .add_source(Environment::with_prefix("HELPDESK").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that deserialize fine but cannot run safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.cron_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.cron_secret must not be empty".into(),
            ));
        }
        if self.outbox.max_attempts < 1 {
            return Err(ConfigError::Message(
                "outbox.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
