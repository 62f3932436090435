//! Long-polling update stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::error::BotApiError;
use crate::types::{GetUpdatesParams, Update};
use crate::TelegramClient;

/// A stream of incoming updates.
pub type UpdateStream = Pin<Box<dyn Stream<Item = Result<Update, BotApiError>> + Send>>;

/// Configuration for retrying after failed polls.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive failures (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Long-polling timeout passed to `getUpdates`, in seconds.
    pub timeout_secs: u64,
    /// Update kinds to receive. Empty means the server default.
    pub allowed_updates: Vec<String>,
    /// Backoff after failed polls.
    pub reconnect: ReconnectConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 25,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
            reconnect: ReconnectConfig::default(),
        }
    }
}

struct PollState {
    client: TelegramClient,
    config: PollingConfig,
    offset: Option<i64>,
    pending: VecDeque<Update>,
    failures: u32,
    backoff_hint: Option<Duration>,
}

/// Subscribe to updates via `getUpdates` long polling.
///
/// Updates are yielded in server order and acknowledged by advancing the
/// offset past each batch. Poll failures are yielded as errors and retried
/// with backoff; the stream ends once `max_retries` consecutive failures
/// have occurred.
pub fn subscribe(client: &TelegramClient, config: PollingConfig) -> UpdateStream {
    info!("Starting long polling (timeout {}s)", config.timeout_secs);

    let state = PollState {
        client: client.clone(),
        config,
        offset: None,
        pending: VecDeque::new(),
        failures: 0,
        backoff_hint: None,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(update) = state.pending.pop_front() {
                return Some((Ok(update), state));
            }

            if state.failures > 0 {
                let delay = state.backoff_hint.take().unwrap_or_else(|| {
                    state.config.reconnect.delay_for_attempt(state.failures - 1)
                });
                debug!("Retrying getUpdates in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            let params = GetUpdatesParams {
                offset: state.offset,
                timeout: state.config.timeout_secs,
                allowed_updates: state.config.allowed_updates.clone(),
            };

            match state.client.get_updates(&params).await {
                Ok(updates) => {
                    if state.failures > 0 {
                        info!("Polling restored after {} failures", state.failures);
                    }
                    state.failures = 0;
                    if let Some(last) = updates.last() {
                        state.offset = Some(last.update_id + 1);
                    }
                    debug!("Received {} updates", updates.len());
                    state.pending.extend(updates);
                }
                Err(e) => {
                    state.failures += 1;
                    state.backoff_hint = e.retry_after().map(Duration::from_secs);
                    if !state.config.reconnect.should_retry(state.failures) {
                        error!("Giving up polling after {} failures: {}", state.failures, e);
                        return None;
                    }
                    warn!("getUpdates failed (failures: {}): {}", state.failures, e);
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
