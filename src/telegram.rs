use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient};
use teloxide::RequestError;
use tracing::{debug, error, info};

use crate::config::{MessageFormat, TelegramConfig};
use crate::error::LeadError;
use crate::message::NotificationMessage;
use crate::notifier::DeliveryError;

/// The two Bot API calls a lead needs. Tokens are passed per call because
/// they are resolved per request from the injected configuration.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// `getMe`: `InvalidToken` if Telegram rejects the credential.
    async fn verify_token(&self, token: &str) -> Result<(), LeadError>;

    /// `sendMessage` with the notification text and its inline button.
    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), DeliveryError>;
}

/// Bot API client backed by teloxide.
pub struct TelegramApi {
    client: reqwest::Client,
    api_url: Url,
    timeout: Duration,
}

impl TelegramApi {
    /// `timeout` must match the one configured on `client`; transport
    /// timeouts are reported with it.
    pub fn new(client: reqwest::Client, api_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            api_url,
            timeout,
        }
    }

    /// Build the client with the per-call timeout baked into the transport.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid Telegram API url: {}", config.api_url))?;
        let timeout = config.send_timeout();
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client, api_url, timeout))
    }

    fn bot(&self, token: &str) -> Bot {
        Bot::with_client(token, self.client.clone()).set_api_url(self.api_url.clone())
    }
}

/// Numeric ids go out as chat ids, anything else (e.g. "@channel") as a username.
pub fn recipient(chat_id: &str) -> Recipient {
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

// A transport timeout is the same bound as the notifier's, so it is recorded
// as a timeout rather than a network failure.
fn delivery_error(err: RequestError, timeout: Duration) -> DeliveryError {
    match err {
        RequestError::Api(api) => DeliveryError::Api(api.to_string()),
        RequestError::Network(e) if e.is_timeout() => DeliveryError::Timeout(timeout),
        RequestError::Network(e) => DeliveryError::Network(e.to_string()),
        RequestError::InvalidJson { source, .. } => {
            DeliveryError::InvalidResponse(source.to_string())
        }
        other => DeliveryError::Api(other.to_string()),
    }
}

fn keyboard(message: &NotificationMessage) -> Result<InlineKeyboardMarkup, DeliveryError> {
    let url = Url::parse(&message.button.url)
        .map_err(|e| DeliveryError::InvalidRequest(format!("button url: {}", e)))?;
    Ok(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url(message.button.text.clone(), url),
    ]]))
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn verify_token(&self, token: &str) -> Result<(), LeadError> {
        match self.bot(token).get_me().await {
            Ok(me) => {
                debug!("Telegram token belongs to @{}", me.username());
                Ok(())
            }
            // Any `ok: false` reply to getMe counts as a rejected credential.
            Err(
                e @ (RequestError::Api(_)
                | RequestError::RetryAfter(_)
                | RequestError::MigrateToChatId(_)),
            ) => {
                error!("Telegram rejected the bot token: {}", e);
                Err(LeadError::InvalidToken)
            }
            Err(e) => Err(LeadError::Unexpected(format!(
                "Telegram token check failed: {}",
                e
            ))),
        }
    }

    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        message: &NotificationMessage,
    ) -> Result<(), DeliveryError> {
        let markup = keyboard(message)?;
        let bot = self.bot(token);

        let mut request = bot
            .send_message(recipient(chat_id), message.text.clone())
            .reply_markup(markup);
        if message.format == MessageFormat::Markdown {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }

        let sent = request
            .await
            .map_err(|e| delivery_error(e, self.timeout))?;
        info!("Lead sent to chat {} (message {})", chat_id, sent.id.0);
        Ok(())
    }
}

/// Sleep long enough that any sane timeout fires first.
#[cfg(test)]
pub(crate) const STALL: Duration = Duration::from_secs(3600);
