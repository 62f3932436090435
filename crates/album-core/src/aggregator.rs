//! Debounced buffering of media bursts into albums.
//!
//! Telegram delivers the items of one media group as separate messages
//! with no "last item" marker. Items are buffered per `(uploader, group)`
//! and the buffer is finalized once no new item arrived for the debounce
//! window. Every new item cancels the pending timer and starts a fresh one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::store::AlbumStore;
use crate::transport::Transport;
use crate::types::{InboundMedia, MediaItem, MAX_ALBUM_ITEMS};

type BufferKey = (i64, String);

/// An upload that was stored under a shareable key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedUpload {
    pub uploader: i64,
    /// Chat the upload came from, where the uploader expects the key.
    pub chat_id: i64,
    pub key: String,
    pub item_count: usize,
    /// 1 for a plain album, more for a collection.
    pub album_count: usize,
}

/// An upload that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailed {
    pub uploader: i64,
    pub chat_id: i64,
    pub item_count: usize,
    pub reason: String,
}

/// Result of finalizing one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Finalized(FinalizedUpload),
    Failed(UploadFailed),
}

#[derive(Debug)]
struct Buffer {
    items: Vec<MediaItem>,
    chat_id: i64,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    store: Arc<AlbumStore>,
    transport: Arc<dyn Transport>,
    debounce: Duration,
    buffers: Mutex<HashMap<BufferKey, Buffer>>,
    next_generation: AtomicU64,
    events: mpsc::UnboundedSender<UploadEvent>,
}

/// Turns bursts of grouped media into stored albums.
#[derive(Clone)]
pub struct MediaAggregator {
    inner: Arc<Inner>,
}

impl MediaAggregator {
    /// Create an aggregator and the receiver for its upload events.
    pub fn new(
        store: Arc<AlbumStore>,
        transport: Arc<dyn Transport>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let aggregator = Self {
            inner: Arc::new(Inner {
                store,
                transport,
                debounce,
                buffers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                events,
            }),
        };
        (aggregator, receiver)
    }

    /// Accept one inbound media item.
    ///
    /// Grouped items are buffered and debounced. An item without a group
    /// id becomes a one-item album right away.
    pub async fn ingest(&self, media: InboundMedia) {
        let InboundMedia {
            uploader,
            chat_id,
            message_id,
            group_id,
            item,
        } = media;

        let standalone = match group_id {
            Some(group_id) => {
                self.buffer((uploader, group_id), chat_id, item);
                None
            }
            None => Some(item),
        };

        if let Err(e) = self.inner.transport.archive(chat_id, message_id).await {
            warn!(message_id, "Failed to archive upload: {}", e);
        }

        if let Some(item) = standalone {
            self.inner.finalize_items(uploader, chat_id, vec![item]).await;
        }
    }

    /// Number of groups still waiting for their debounce timer.
    pub fn pending_groups(&self) -> usize {
        self.inner.lock().len()
    }

    /// Finalize every open buffer now. Returns how many were finalized.
    pub async fn flush(&self) -> usize {
        let drained: Vec<(BufferKey, Buffer)> = self.inner.lock().drain().collect();
        let count = drained.len();

        for ((uploader, _group), mut buffer) in drained {
            if let Some(timer) = buffer.timer.take() {
                timer.abort();
            }
            if !buffer.items.is_empty() {
                self.inner
                    .finalize_items(uploader, buffer.chat_id, buffer.items)
                    .await;
            }
        }
        count
    }

    fn buffer(&self, key: BufferKey, chat_id: i64, item: MediaItem) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut buffers = self.inner.lock();

        let buffer = buffers.entry(key.clone()).or_insert_with(|| Buffer {
            items: Vec::new(),
            chat_id,
            generation,
            timer: None,
        });
        buffer.items.push(item);
        buffer.generation = generation;
        if let Some(previous) = buffer.timer.take() {
            previous.abort();
        }

        debug!(
            uploader = key.0,
            group = %key.1,
            items = buffer.items.len(),
            "Buffered media item"
        );

        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.debounce;
        buffer.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.finalize(key, generation).await;
        }));
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<BufferKey, Buffer>> {
        self.buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Finalize a buffer if `generation` is still its latest.
    ///
    /// A timer that lost a race with a newer item, or with `flush`, finds
    /// a different generation or no buffer and does nothing.
    async fn finalize(&self, key: BufferKey, generation: u64) {
        let buffer = {
            let mut buffers = self.lock();
            let current = buffers
                .get(&key)
                .is_some_and(|buffer| buffer.generation == generation);
            if current {
                buffers.remove(&key)
            } else {
                None
            }
        };

        let Some(buffer) = buffer else {
            debug!(group = %key.1, "Stale debounce timer ignored");
            return;
        };
        if buffer.items.is_empty() {
            return;
        }

        self.finalize_items(key.0, buffer.chat_id, buffer.items).await;
    }

    async fn finalize_items(&self, uploader: i64, chat_id: i64, items: Vec<MediaItem>) {
        let item_count = items.len();
        let event = match self.store.create(items, uploader).await {
            Ok(key) => {
                info!(key = %key, uploader, items = item_count, "Upload finalized");
                UploadEvent::Finalized(FinalizedUpload {
                    uploader,
                    chat_id,
                    key,
                    item_count,
                    album_count: item_count.div_ceil(MAX_ALBUM_ITEMS),
                })
            }
            Err(e) => {
                error!(uploader, items = item_count, "Failed to store upload: {}", e);
                UploadEvent::Failed(UploadFailed {
                    uploader,
                    chat_id,
                    item_count,
                    reason: e.to_string(),
                })
            }
        };

        if self.events.send(event).is_err() {
            debug!("Upload event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::repository::MemoryRepository;
    use crate::types::{MediaKind, Resolved};

    struct Fixture {
        repo: Arc<MemoryRepository>,
        store: Arc<AlbumStore>,
        transport: Arc<MockTransport>,
        aggregator: MediaAggregator,
        events: mpsc::UnboundedReceiver<UploadEvent>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(AlbumStore::new(repo.clone()));
        let transport = Arc::new(MockTransport::new());
        let (aggregator, events) =
            MediaAggregator::new(store.clone(), transport.clone(), Duration::from_secs(1));
        Fixture {
            repo,
            store,
            transport,
            aggregator,
            events,
        }
    }

    fn media(uploader: i64, group: Option<&str>, file: &str, message_id: i32) -> InboundMedia {
        InboundMedia {
            uploader,
            chat_id: uploader,
            message_id,
            group_id: group.map(str::to_string),
            item: MediaItem::new(file, MediaKind::Photo),
        }
    }

    async fn next_finalized(events: &mut mpsc::UnboundedReceiver<UploadEvent>) -> FinalizedUpload {
        match events.recv().await {
            Some(UploadEvent::Finalized(upload)) => upload,
            other => panic!("expected a finalized upload, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_becomes_one_ordered_album() {
        let mut f = fixture();
        for (i, file) in ["a", "b", "c"].iter().enumerate() {
            f.aggregator.ingest(media(1, Some("g1"), file, i as i32)).await;
            tokio::time::sleep(Duration::from_millis(900)).await;
        }
        assert_eq!(f.aggregator.pending_groups(), 1);

        let upload = next_finalized(&mut f.events).await;
        assert_eq!(upload.item_count, 3);
        assert_eq!(upload.album_count, 1);
        assert_eq!(f.aggregator.pending_groups(), 0);

        let album = f.store.resolve_album(&upload.key).await.unwrap().unwrap();
        let files: Vec<&str> = album.items.iter().map(|i| i.file_id.as_str()).collect();
        assert_eq!(files, vec!["a", "b", "c"]);
        assert_eq!(f.repo.album_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restarts_on_each_item() {
        let f = fixture();
        f.aggregator.ingest(media(1, Some("g"), "a", 1)).await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        f.aggregator.ingest(media(1, Some("g"), "b", 2)).await;

        // 1.6s after the first item, 0.8s after the second: still open
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(f.aggregator.pending_groups(), 1);
        assert_eq!(f.repo.album_count(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(f.aggregator.pending_groups(), 0);
        assert_eq!(f.repo.album_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_are_independent() {
        let mut f = fixture();
        f.aggregator.ingest(media(1, Some("g1"), "a", 1)).await;
        f.aggregator.ingest(media(1, Some("g2"), "b", 2)).await;
        f.aggregator.ingest(media(2, Some("g1"), "c", 3)).await;
        assert_eq!(f.aggregator.pending_groups(), 3);

        let mut counts = Vec::new();
        for _ in 0..3 {
            counts.push(next_finalized(&mut f.events).await.item_count);
        }
        assert_eq!(counts, vec![1, 1, 1]);
        assert_eq!(f.repo.album_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ungrouped_media_is_immediate() {
        let mut f = fixture();
        f.aggregator.ingest(media(1, None, "solo", 1)).await;

        let upload = f.events.try_recv().unwrap();
        let UploadEvent::Finalized(upload) = upload else {
            panic!("expected finalized upload");
        };
        assert_eq!(upload.item_count, 1);
        assert_eq!(f.aggregator.pending_groups(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_burst_becomes_collection() {
        let mut f = fixture();
        for i in 0..23 {
            f.aggregator
                .ingest(media(1, Some("big"), &format!("f{i}"), i))
                .await;
        }

        let upload = next_finalized(&mut f.events).await;
        assert_eq!(upload.item_count, 23);
        assert_eq!(upload.album_count, 3);
        assert!(matches!(
            f.store.resolve(&upload.key).await.unwrap(),
            Some(Resolved::Collection(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_archive_failure_does_not_block_buffering() {
        let mut f = fixture();
        f.transport.fail_archive();
        f.aggregator.ingest(media(1, Some("g"), "a", 1)).await;
        f.aggregator.ingest(media(1, Some("g"), "b", 2)).await;

        assert_eq!(next_finalized(&mut f.events).await.item_count, 2);
        assert!(f.transport.archived().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_archive_forwards_each_item() {
        let f = fixture();
        f.aggregator.ingest(media(1, Some("g"), "a", 11)).await;
        f.aggregator.ingest(media(1, Some("g"), "b", 12)).await;
        assert_eq!(f.transport.archived(), vec![(1, 11), (1, 12)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_emits_failed_event() {
        let mut f = fixture();
        f.repo.set_unavailable(true);
        f.aggregator.ingest(media(1, Some("g"), "a", 1)).await;

        match f.events.recv().await {
            Some(UploadEvent::Failed(failed)) => {
                assert_eq!(failed.item_count, 1);
                assert_eq!(failed.uploader, 1);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_finalizes_once() {
        let mut f = fixture();
        f.aggregator.ingest(media(1, Some("g"), "a", 1)).await;
        f.aggregator.ingest(media(1, Some("g"), "b", 2)).await;

        assert_eq!(f.aggregator.flush().await, 1);
        assert_eq!(next_finalized(&mut f.events).await.item_count, 2);

        // The aborted timer must not finalize again
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.repo.album_count(), 1);
    }
}
