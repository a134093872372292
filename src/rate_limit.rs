//! Per-client cooldown for the lead endpoint.
//!
//! One accepted request per client key per cooldown window, measured from the
//! last *accepted* request. Throttled requests leave the clock untouched.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Throttled { retry_after_ms: i64 },
}

/// Bounded table of last-accepted timestamps (ms since epoch) keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown_ms: i64,
    max_clients: usize,
    last_accepted: Mutex<HashMap<String, i64>>,
}

impl RateLimiter {
    pub fn new(cooldown_ms: u64, max_clients: usize) -> Self {
        Self {
            cooldown_ms: i64::try_from(cooldown_ms).unwrap_or(i64::MAX),
            max_clients: max_clients.max(1),
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.cooldown_ms, config.max_clients)
    }

    /// Check `client_key` against the cooldown and record `now_ms` if allowed.
    ///
    /// The whole read-modify-write happens under one lock.
    pub async fn check_and_record(&self, client_key: &str, now_ms: i64) -> RateDecision {
        let mut table = self.last_accepted.lock().await;

        let last = table.get(client_key).copied().unwrap_or(0);
        let elapsed = now_ms.saturating_sub(last);
        if elapsed < self.cooldown_ms {
            return RateDecision::Throttled {
                retry_after_ms: self.cooldown_ms - elapsed,
            };
        }

        if !table.contains_key(client_key) && table.len() >= self.max_clients {
            self.evict(&mut table, now_ms);
        }
        table.insert(client_key.to_string(), now_ms);

        RateDecision::Allowed
    }

    // Expired entries go first since they behave like absent keys; if the
    // table is still full, drop the client accepted longest ago.
    fn evict(&self, table: &mut HashMap<String, i64>, now_ms: i64) {
        let before = table.len();
        table.retain(|_, last| now_ms.saturating_sub(*last) < self.cooldown_ms);

        if table.len() >= self.max_clients {
            let oldest = table
                .iter()
                .min_by_key(|(_, last)| **last)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                table.remove(&key);
            }
        }

        debug!(
            "Rate limiter evicted {} client(s), {} remain",
            before - table.len(),
            table.len()
        );
    }
}
