use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::LeadError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// MarkdownV2 with every interpolated value escaped.
    #[default]
    Markdown,
    /// Raw text, no `parse_mode`.
    Plain,
}

impl std::fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageFormat::Markdown => write!(f, "markdown"),
            MessageFormat::Plain => write!(f, "plain"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_telegram_config")]
    pub telegram: TelegramConfig,
    #[serde(default = "default_rate_limit_config")]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Header set by the fronting proxy; its first comma-separated entry is the client IP.
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Comma-separated destination chat ids, e.g. "-1001234567890, @buyback_leads"
    #[serde(default)]
    pub chat_ids: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_verify_token")]
    pub verify_token: bool,
    #[serde(default)]
    pub message_format: MessageFormat,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

/// Credentials and destinations resolved for one lead.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    pub token: String,
    pub chat_ids: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_client_ip_header() -> String {
    "x-forwarded-for".to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_verify_token() -> bool {
    true
}

fn default_send_timeout_secs() -> u64 {
    20
}

fn default_cooldown_ms() -> u64 {
    10_000
}

fn default_max_clients() -> usize {
    10_000
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind: default_bind(),
        client_ip_header: default_client_ip_header(),
    }
}

fn default_telegram_config() -> TelegramConfig {
    TelegramConfig {
        bot_token: None,
        chat_ids: None,
        api_url: default_api_url(),
        verify_token: default_verify_token(),
        message_format: MessageFormat::default(),
        send_timeout_secs: default_send_timeout_secs(),
    }
}

fn default_rate_limit_config() -> RateLimitConfig {
    RateLimitConfig {
        cooldown_ms: default_cooldown_ms(),
        max_clients: default_max_clients(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server_config(),
            telegram: default_telegram_config(),
            rate_limit: default_rate_limit_config(),
        }
    }
}

/// Split a comma-separated chat id list, dropping blank entries.
pub fn parse_chat_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl TelegramConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Resolve the token and destination list, failing with `MissingConfig`
    /// if either is absent or the list has no usable entry.
    pub fn delivery(&self) -> Result<DeliveryConfig, LeadError> {
        let token = non_blank(self.bot_token.as_ref()).ok_or(LeadError::MissingConfig)?;
        let raw_ids = non_blank(self.chat_ids.as_ref()).ok_or(LeadError::MissingConfig)?;

        let chat_ids = parse_chat_ids(raw_ids);
        if chat_ids.is_empty() {
            return Err(LeadError::MissingConfig);
        }

        Ok(DeliveryConfig {
            token: token.to_string(),
            chat_ids,
        })
    }
}

impl RateLimitConfig {
    /// Whole seconds shown to throttled clients, rounded up.
    pub fn cooldown_secs(&self) -> u64 {
        self.cooldown_ms.div_ceil(1000)
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// Read `path` if it exists (defaults otherwise), then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        } else {
            info!(
                "Config file {} not found, using defaults and environment",
                path.display()
            );
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Environment-style overrides: TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID, LEAD_RELAY_BIND.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_ids) = lookup("TELEGRAM_CHAT_ID") {
            self.telegram.chat_ids = Some(chat_ids);
        }
        if let Some(bind) = lookup("LEAD_RELAY_BIND") {
            self.server.bind = bind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.server.client_ip_header, "x-forwarded-for");
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert!(config.telegram.verify_token);
        assert_eq!(config.telegram.message_format, MessageFormat::Markdown);
        assert_eq!(config.telegram.send_timeout(), Duration::from_secs(20));
        assert_eq!(config.rate_limit.cooldown_ms, 10_000);
        assert_eq!(config.rate_limit.max_clients, 10_000);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml_str(
            r#"
[server]
bind = "127.0.0.1:8080"
client_ip_header = "x-real-ip"

[telegram]
bot_token = "123:abc"
chat_ids = "111, 222"
verify_token = false
message_format = "plain"
send_timeout_secs = 5

[rate_limit]
cooldown_ms = 2500
max_clients = 50
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.client_ip_header, "x-real-ip");
        assert!(!config.telegram.verify_token);
        assert_eq!(config.telegram.message_format, MessageFormat::Plain);
        assert_eq!(config.telegram.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.rate_limit.cooldown_secs(), 3);
        assert_eq!(config.rate_limit.max_clients, 50);
    }

    #[test]
    fn test_unknown_message_format_is_rejected() {
        let result = Config::from_toml_str("[telegram]\nmessage_format = \"html\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_delivery_trims_and_filters_chat_ids() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123:abc".into());
        config.telegram.chat_ids = Some(" 111 ,222,, @leads ,".into());

        let delivery = config.telegram.delivery().unwrap();
        assert_eq!(delivery.token, "123:abc");
        assert_eq!(delivery.chat_ids, vec!["111", "222", "@leads"]);
    }

    #[test]
    fn test_delivery_missing_token() {
        let mut config = Config::default();
        config.telegram.chat_ids = Some("111".into());
        assert_eq!(config.telegram.delivery(), Err(LeadError::MissingConfig));

        config.telegram.bot_token = Some("   ".into());
        assert_eq!(config.telegram.delivery(), Err(LeadError::MissingConfig));
    }

    #[test]
    fn test_delivery_missing_chat_ids() {
        let mut config = Config::default();
        config.telegram.bot_token = Some("123:abc".into());
        assert_eq!(config.telegram.delivery(), Err(LeadError::MissingConfig));

        config.telegram.chat_ids = Some(" , ,".into());
        assert_eq!(config.telegram.delivery(), Err(LeadError::MissingConfig));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TELEGRAM_BOT_TOKEN", "999:zzz"),
            ("TELEGRAM_CHAT_ID", "1,2"),
            ("LEAD_RELAY_BIND", "127.0.0.1:9000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::from_toml_str("[telegram]\nbot_token = \"file-token\"\n").unwrap();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.telegram.bot_token.as_deref(), Some("999:zzz"));
        assert_eq!(config.telegram.chat_ids.as_deref(), Some("1,2"));
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_overrides_keep_file_values_when_env_absent() {
        let mut config = Config::from_toml_str("[telegram]\nbot_token = \"file-token\"\n").unwrap();
        config.apply_overrides(|_| None);
        assert_eq!(config.telegram.bot_token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("lead-relay-no-such-config.toml");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.rate_limit.cooldown_ms, 10_000);
    }
}
