//! Publishing a key's content into the destination chat.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::access::{AccessController, AccessDecision};
use crate::deletion::DeletionScheduler;
use crate::error::{PublishError, TransportError};
use crate::recent::RecentPublishCache;
use crate::repository::Repository;
use crate::settings::SettingsStore;
use crate::store::AlbumStore;
use crate::transport::Transport;
use crate::types::{Album, Collection, Resolved};

/// Summary of a publish that delivered at least one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub key: String,
    /// Grouped posts delivered.
    pub posts: usize,
    /// Media items delivered.
    pub items: usize,
    /// Posts that failed outright or broke off part-way.
    pub failed_posts: usize,
    /// When the posted messages will be deleted.
    pub delete_after: Duration,
}

impl PublishReceipt {
    pub fn is_partial(&self) -> bool {
        self.failed_posts > 0
    }
}

#[derive(Debug, Default)]
struct Delivery {
    message_ids: Vec<i32>,
    sent_children: Vec<(String, Vec<i32>)>,
    posts: usize,
    items: usize,
    failed_posts: usize,
    last_error: Option<String>,
}

impl Delivery {
    /// Account for one grouped post. Returns whether anything reached the
    /// destination, including the leftovers of a post that broke off.
    fn record(
        &mut self,
        child_key: Option<&str>,
        item_count: usize,
        result: Result<Vec<i32>, TransportError>,
    ) -> bool {
        let message_ids = match result {
            Ok(message_ids) => {
                self.posts += 1;
                self.items += item_count;
                message_ids
            }
            Err(e) => {
                self.failed_posts += 1;
                self.last_error = Some(e.to_string());
                match e {
                    TransportError::Partial { message_ids, .. } => {
                        self.items += message_ids.len();
                        message_ids
                    }
                    _ => return false,
                }
            }
        };
        if message_ids.is_empty() {
            return false;
        }

        self.message_ids.extend_from_slice(&message_ids);
        if let Some(child_key) = child_key {
            self.sent_children.push((child_key.to_string(), message_ids));
        }
        true
    }
}

/// Resolves a key, checks access and duplicates, sends, and schedules cleanup.
pub struct PublishCoordinator {
    store: Arc<AlbumStore>,
    access: Arc<AccessController>,
    settings: Arc<SettingsStore>,
    recent: Arc<RecentPublishCache>,
    deletions: Arc<DeletionScheduler>,
    transport: Arc<dyn Transport>,
    repo: Arc<dyn Repository>,
    destination: i64,
    inter_post_delay: Duration,
}

impl PublishCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<AlbumStore>,
        access: Arc<AccessController>,
        settings: Arc<SettingsStore>,
        recent: Arc<RecentPublishCache>,
        deletions: Arc<DeletionScheduler>,
        transport: Arc<dyn Transport>,
        repo: Arc<dyn Repository>,
        destination: i64,
        inter_post_delay: Duration,
    ) -> Self {
        Self {
            store,
            access,
            settings,
            recent,
            deletions,
            transport,
            repo,
            destination,
            inter_post_delay,
        }
    }

    /// Publish the album or collection named by `key` on behalf of `requester`.
    pub async fn publish_by_key(
        &self,
        requester: i64,
        key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let resolved = match self.store.resolve(key).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                return Err(PublishError::NotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                warn!(key, "Failed to resolve key: {}", e);
                return Err(PublishError::DeliveryFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        match self.access.check(requester).await {
            AccessDecision::Granted => {}
            AccessDecision::Denied => return Err(PublishError::Unauthorized { requester }),
            AccessDecision::SubscriptionRequired { channel } => {
                return Err(PublishError::SubscriptionRequired { channel })
            }
        }

        let Some(claim) = self.recent.claim(key) else {
            info!(key, requester, "Key already published, not resending");
            return Err(PublishError::AlreadyPublished {
                key: key.to_string(),
            });
        };

        let delete_after = self.settings.current().await.delete_after;
        let (delivery, caption) = match &resolved {
            Resolved::Album(album) => (self.send_album(album).await, album.caption.clone()),
            Resolved::Collection(collection) => (
                self.send_collection(collection).await,
                collection.caption.clone(),
            ),
        };

        if delivery.message_ids.is_empty() {
            // Dropping the claim releases the key for a retry
            drop(claim);
            return Err(PublishError::DeliveryFailed {
                key: key.to_string(),
                reason: delivery
                    .last_error
                    .unwrap_or_else(|| "nothing was sent".to_string()),
            });
        }

        claim.mark(delivery.message_ids.clone(), caption, delete_after);
        for (child_key, message_ids) in delivery.sent_children {
            self.recent.mark(&child_key, message_ids, None, delete_after);
        }

        self.schedule_cleanup(key, delivery.message_ids, delete_after)
            .await;

        let receipt = PublishReceipt {
            key: key.to_string(),
            posts: delivery.posts,
            items: delivery.items,
            failed_posts: delivery.failed_posts,
            delete_after,
        };
        info!(
            key,
            requester,
            posts = receipt.posts,
            items = receipt.items,
            failed_posts = receipt.failed_posts,
            delete_after_secs = delete_after.as_secs(),
            "Published"
        );
        Ok(receipt)
    }

    async fn send_album(&self, album: &Album) -> Delivery {
        let mut delivery = Delivery::default();
        let result = self
            .transport
            .send_grouped_post(self.destination, &album.items, album.caption.as_deref())
            .await;
        if let Err(e) = &result {
            warn!(key = %album.key, "Failed to send album: {}", e);
        }
        delivery.record(None, album.items.len(), result);
        delivery
    }

    /// Send each child in stored order, skipping children that fail.
    ///
    /// The caption goes on the first post that is actually delivered.
    async fn send_collection(&self, collection: &Collection) -> Delivery {
        let mut delivery = Delivery::default();
        let mut caption = collection.caption.as_deref();

        for (index, child_key) in collection.album_keys.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inter_post_delay).await;
            }

            let album = match self.store.resolve_album(child_key).await {
                Ok(Some(album)) => album,
                Ok(None) => {
                    warn!(collection = %collection.key, child = %child_key, "Child album missing, skipping");
                    delivery.failed_posts += 1;
                    continue;
                }
                Err(e) => {
                    warn!(collection = %collection.key, child = %child_key, "Failed to resolve child album: {}", e);
                    delivery.failed_posts += 1;
                    delivery.last_error = Some(e.to_string());
                    continue;
                }
            };

            let result = self
                .transport
                .send_grouped_post(self.destination, &album.items, caption)
                .await;
            if let Err(e) = &result {
                warn!(collection = %collection.key, child = %child_key, "Failed to send child album: {}", e);
            }
            if delivery.record(Some(child_key), album.items.len(), result) {
                caption = None;
            }
        }
        delivery
    }

    async fn schedule_cleanup(&self, key: &str, message_ids: Vec<i32>, delete_after: Duration) {
        let published_at = Utc::now();
        let delete_at = chrono::Duration::from_std(delete_after)
            .map(|delay| published_at + delay)
            .unwrap_or(published_at);

        match self
            .repo
            .record_publication(key, self.destination, &message_ids, published_at, delete_at)
            .await
        {
            Ok(id) => {
                self.deletions
                    .schedule_recorded(id, self.destination, message_ids, delete_after);
            }
            Err(e) => {
                warn!(key, "Failed to record publication: {}", e);
                self.deletions
                    .schedule(self.destination, message_ids, delete_after);
            }
        }
    }
}
