//! Wiring of the core components around one repository and transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::access::AccessController;
use crate::aggregator::{MediaAggregator, UploadEvent};
use crate::config::CoreConfig;
use crate::deletion::DeletionScheduler;
use crate::error::{CoreError, PublishError};
use crate::publisher::{PublishCoordinator, PublishReceipt};
use crate::recent::RecentPublishCache;
use crate::repository::Repository;
use crate::settings::SettingsStore;
use crate::store::AlbumStore;
use crate::transport::Transport;

/// Process-scoped state of the album pipeline.
///
/// Create one per process (or per test) and share it behind an `Arc`.
pub struct AlbumPipeline {
    pub config: CoreConfig,
    pub settings: Arc<SettingsStore>,
    pub access: Arc<AccessController>,
    pub store: Arc<AlbumStore>,
    pub aggregator: MediaAggregator,
    pub recent: Arc<RecentPublishCache>,
    pub deletions: Arc<DeletionScheduler>,
    pub publisher: Arc<PublishCoordinator>,
}

impl AlbumPipeline {
    /// Build every component. Returns the receiver for upload events.
    pub fn new(
        repo: Arc<dyn Repository>,
        transport: Arc<dyn Transport>,
        config: CoreConfig,
    ) -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let settings = Arc::new(SettingsStore::new(Arc::clone(&repo), &config));
        let access = Arc::new(AccessController::new(
            Arc::clone(&settings),
            Arc::clone(&repo),
            Arc::clone(&transport),
            config.destination,
        ));
        let store = Arc::new(AlbumStore::new(Arc::clone(&repo)));
        let (aggregator, events) =
            MediaAggregator::new(Arc::clone(&store), Arc::clone(&transport), config.debounce);
        let recent = Arc::new(RecentPublishCache::new());
        let deletions = Arc::new(DeletionScheduler::new(
            Arc::clone(&transport),
            Arc::clone(&repo),
        ));
        let publisher = Arc::new(PublishCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&access),
            Arc::clone(&settings),
            Arc::clone(&recent),
            Arc::clone(&deletions),
            transport,
            repo,
            config.destination,
            config.inter_post_delay,
        ));

        let pipeline = Self {
            config,
            settings,
            access,
            store,
            aggregator,
            recent,
            deletions,
            publisher,
        };
        (pipeline, events)
    }

    /// Load settings, resume pending deletions and start the cache sweeper.
    ///
    /// A settings failure here should stop the process.
    pub async fn start(&self) -> Result<JoinHandle<()>, CoreError> {
        let settings = self.settings.bootstrap().await?;
        info!(
            mode = settings.access_mode.as_str(),
            delete_after_secs = settings.delete_after.as_secs(),
            gate = settings.subscription_channel.as_deref().unwrap_or("off"),
            "Settings loaded"
        );

        self.deletions.resume_pending().await;
        Ok(self.recent.start_sweeper(self.config.sweep_interval))
    }

    pub async fn publish_by_key(
        &self,
        requester: i64,
        key: &str,
    ) -> Result<PublishReceipt, PublishError> {
        self.publisher.publish_by_key(requester, key).await
    }

    /// Finalize uploads still waiting for their debounce timer.
    pub async fn shutdown(&self) {
        let flushed = self.aggregator.flush().await;
        if flushed > 0 {
            info!(flushed, "Flushed pending uploads on shutdown");
        }
    }
}
