use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::warn;

use crate::message::NotificationMessage;
use crate::telegram::BotApi;

/// Why one destination did not get the lead. Never shown to the client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("unparsable Telegram response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub chat_id: String,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

/// Best-effort broadcast of one notification to every destination.
pub struct Notifier {
    api: Arc<dyn BotApi>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(api: Arc<dyn BotApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Send to all `chat_ids` concurrently, each bounded by its own timeout.
    /// Outcomes come back in the order of `chat_ids`.
    pub async fn deliver(
        &self,
        token: &str,
        message: &NotificationMessage,
        chat_ids: &[String],
    ) -> Vec<DeliveryOutcome> {
        let sends = chat_ids.iter().map(|chat_id| async move {
            let result = match tokio::time::timeout(
                self.timeout,
                self.api.send_message(token, chat_id, message),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout(self.timeout)),
            };

            if let Err(e) = &result {
                warn!("Failed to deliver lead to chat {}: {}", chat_id, e);
            }

            DeliveryOutcome {
                chat_id: chat_id.clone(),
                result,
            }
        });

        join_all(sends).await
    }
}
