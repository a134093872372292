use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Utc};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, TelegramConfig};
use crate::error::LeadError;
use crate::lead::{self, Lead};
use crate::message::NotificationMessage;
use crate::notifier::{DeliveryOutcome, Notifier};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::telegram::BotApi;

/// Runs one lead through rate check, validation, credential check and fan-out.
pub struct LeadIntake {
    telegram: TelegramConfig,
    cooldown_secs: u64,
    limiter: RateLimiter,
    api: Arc<dyn BotApi>,
    notifier: Notifier,
}

impl LeadIntake {
    pub fn new(config: &Config, api: Arc<dyn BotApi>) -> Self {
        Self {
            telegram: config.telegram.clone(),
            cooldown_secs: config.rate_limit.cooldown_secs(),
            limiter: RateLimiter::from_config(&config.rate_limit),
            notifier: Notifier::new(api.clone(), config.telegram.send_timeout()),
            api,
        }
    }

    /// Handle a raw request body from `client_key` using the wall clock.
    pub async fn handle(
        &self,
        client_key: &str,
        body: &[u8],
    ) -> Result<Vec<DeliveryOutcome>, LeadError> {
        self.handle_at(
            client_key,
            body,
            Utc::now().timestamp_millis(),
            Local::now().naive_local(),
        )
        .await
    }

    /// Same as [`handle`](Self::handle) with explicit clocks: `now_ms` feeds
    /// the rate limiter, `received_at` is printed in the notification.
    ///
    /// Delivery failures are returned in the outcomes, never as `Err`.
    pub async fn handle_at(
        &self,
        client_key: &str,
        body: &[u8],
        now_ms: i64,
        received_at: NaiveDateTime,
    ) -> Result<Vec<DeliveryOutcome>, LeadError> {
        let lead_id = Uuid::new_v4();
        let span = info_span!("lead", %lead_id, client = %client_key);

        async move {
            if let RateDecision::Throttled { retry_after_ms } =
                self.limiter.check_and_record(client_key, now_ms).await
            {
                warn!(
                    "Too many requests from {}, retry in {}ms",
                    client_key, retry_after_ms
                );
                return Err(LeadError::Throttled {
                    cooldown_secs: self.cooldown_secs,
                });
            }

            let lead: Lead = serde_json::from_slice(body)?;
            info!(
                "Lead received: brand={:?} model={:?} year={:?}",
                lead.brand, lead.model, lead.year
            );

            let valid = lead::validate(lead).inspect_err(|e| {
                if *e == LeadError::InvalidPhone {
                    warn!("Rejected lead with invalid phone number");
                }
            })?;

            let delivery = self.telegram.delivery().inspect_err(|_| {
                error!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID is not configured");
            })?;

            if self.telegram.verify_token {
                self.api.verify_token(&delivery.token).await?;
            }

            let message =
                NotificationMessage::build(&valid, received_at, self.telegram.message_format);
            let outcomes = self
                .notifier
                .deliver(&delivery.token, &message, &delivery.chat_ids)
                .await;

            let failed: Vec<&str> = outcomes
                .iter()
                .filter(|o| !o.is_delivered())
                .map(|o| o.chat_id.as_str())
                .collect();
            if failed.is_empty() {
                info!("Lead delivered to all {} chat(s)", outcomes.len());
            } else {
                warn!(
                    "Lead delivered to {}/{} chat(s), failed: {:?}",
                    outcomes.len() - failed.len(),
                    outcomes.len(),
                    failed
                );
            }

            Ok(outcomes)
        }
        .instrument(span)
        .await
    }
}
