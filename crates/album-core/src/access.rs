//! Publish access decisions.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::repository::Repository;
use crate::settings::SettingsStore;
use crate::transport::Transport;
use crate::types::AccessMode;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// Restricted mode and the requester is not allow-listed.
    Denied,
    /// The requester must join `channel` and retry.
    SubscriptionRequired { channel: String },
}

/// Decides whether a requester may trigger a publish.
///
/// Every check reads the allow-list and membership fresh. Any failure to
/// read either counts against the requester.
pub struct AccessController {
    settings: Arc<SettingsStore>,
    repo: Arc<dyn Repository>,
    transport: Arc<dyn Transport>,
    destination: i64,
}

impl AccessController {
    pub fn new(
        settings: Arc<SettingsStore>,
        repo: Arc<dyn Repository>,
        transport: Arc<dyn Transport>,
        destination: i64,
    ) -> Self {
        Self {
            settings,
            repo,
            transport,
            destination,
        }
    }

    /// Evaluate the access mode, then the subscription gate.
    pub async fn check(&self, requester: i64) -> AccessDecision {
        let settings = self.settings.current().await;

        if settings.access_mode == AccessMode::Restricted {
            match self.repo.is_allowed(self.destination, requester).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(requester, "Requester not in allow-list");
                    return AccessDecision::Denied;
                }
                Err(e) => {
                    warn!(requester, "Allow-list lookup failed, denying: {}", e);
                    return AccessDecision::Denied;
                }
            }
        }

        if let Some(channel) = settings.subscription_channel {
            let subscribed = match self.transport.verify_membership(requester, &channel).await {
                Ok(subscribed) => subscribed,
                Err(e) => {
                    warn!(requester, channel = %channel, "Membership check failed: {}", e);
                    false
                }
            };
            if !subscribed {
                return AccessDecision::SubscriptionRequired { channel };
            }
        }

        AccessDecision::Granted
    }

    /// Add `user` to the destination's allow-list. Returns false if already present.
    pub async fn allow(&self, user: i64) -> Result<bool, CoreError> {
        Ok(self.repo.add_allowed(self.destination, user).await?)
    }

    /// Remove `user` from the allow-list. Returns false if absent.
    pub async fn disallow(&self, user: i64) -> Result<bool, CoreError> {
        Ok(self.repo.remove_allowed(self.destination, user).await?)
    }

    pub async fn allowed(&self) -> Result<Vec<i64>, CoreError> {
        Ok(self.repo.list_allowed(self.destination).await?)
    }
}
